use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for job postings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

/// Identifier wrapper for user accounts (students, recruiters, admins).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// The `(job, student)` pair that uniquely identifies an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationKey {
    pub job: JobId,
    pub student: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Recruiter,
    Admin,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Recruiter => "recruiter",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "recruiter" => Some(Self::Recruiter),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// The caller on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// User record as exposed by the account directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Active,
    Inactive,
    Expired,
}

/// Job posting snapshot read from the directory when handling applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub title: String,
    pub created_by: UserId,
    pub status: JobStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl JobPosting {
    /// A job takes applications only while active and before its expiry.
    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Active && self.expires_at > now
    }
}

/// Status tracked throughout an application's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Reviewed,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewed => "reviewed",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw.trim()))
    }
}

/// One entry of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub changed_at: DateTime<Utc>,
    pub updated_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Where the stored resume lives once the upload completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRef {
    pub url: String,
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChannel {
    #[default]
    Web,
    Mobile,
    Api,
}

impl SourceChannel {
    pub const fn label(self) -> &'static str {
        match self {
            SourceChannel::Web => "web",
            SourceChannel::Mobile => "mobile",
            SourceChannel::Api => "api",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "web" => Some(Self::Web),
            "mobile" => Some(Self::Mobile),
            "api" => Some(Self::Api),
            _ => None,
        }
    }
}

/// Request details captured alongside a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub source: SourceChannel,
}

/// A student's submission against one job posting.
///
/// The `(job, student)` pair is private so it cannot change after creation;
/// everything the lifecycle rules mutate is public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    job: JobId,
    student: UserId,
    pub status: ApplicationStatus,
    pub resume: ResumeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
    pub status_history: Vec<StatusChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawal_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub metadata: SubmissionMetadata,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Build a fresh application. New records always start `pending` with an
    /// empty history.
    pub fn new(
        id: ApplicationId,
        key: ApplicationKey,
        resume: ResumeRef,
        cover_letter: Option<String>,
        metadata: SubmissionMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job: key.job,
            student: key.student,
            status: ApplicationStatus::Pending,
            resume,
            cover_letter,
            status_history: Vec::new(),
            withdrawal_reason: None,
            reviewed_at: None,
            rejected_at: None,
            withdrawn_at: None,
            metadata,
            applied_at: now,
            updated_at: now,
        }
    }

    pub fn job(&self) -> &JobId {
        &self.job
    }

    pub fn student(&self) -> &UserId {
        &self.student
    }

    pub fn key(&self) -> ApplicationKey {
        ApplicationKey {
            job: self.job.clone(),
            student: self.student.clone(),
        }
    }

    pub fn summary(&self) -> ApplicationSummary {
        ApplicationSummary {
            application_id: self.id.clone(),
            job_id: self.job.clone(),
            student_id: self.student.clone(),
            status: self.status.label(),
            applied_at: self.applied_at,
            resume_file_name: self.resume.file_name.clone(),
        }
    }
}

/// Compact representation returned after a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummary {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub student_id: UserId,
    pub status: &'static str,
    pub applied_at: DateTime<Utc>,
    pub resume_file_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn status_parse_accepts_labels_case_insensitively() {
        assert_eq!(
            ApplicationStatus::parse("Reviewed"),
            Some(ApplicationStatus::Reviewed)
        );
        assert_eq!(
            ApplicationStatus::parse(" withdrawn "),
            Some(ApplicationStatus::Withdrawn)
        );
        assert_eq!(ApplicationStatus::parse("shortlisted"), None);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&ApplicationStatus::Rejected).expect("serializes");
        assert_eq!(json, "\"rejected\"");
    }

    #[test]
    fn job_accepts_applications_only_while_active_and_unexpired() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut job = JobPosting {
            id: JobId("job-1".to_string()),
            title: "Backend Intern".to_string(),
            created_by: UserId("rec-1".to_string()),
            status: JobStatus::Active,
            expires_at: now + Duration::days(1),
            created_at: now - Duration::days(10),
        };
        assert!(job.accepts_applications(now));

        job.expires_at = now;
        assert!(!job.accepts_applications(now));

        job.expires_at = now + Duration::days(1);
        job.status = JobStatus::Inactive;
        assert!(!job.accepts_applications(now));
    }
}
