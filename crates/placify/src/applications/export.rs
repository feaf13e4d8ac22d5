use serde::Serialize;

use super::domain::{Application, JobPosting};

#[derive(Debug, Serialize)]
struct ApplicantRow<'a> {
    application_id: &'a str,
    job_id: &'a str,
    job_title: &'a str,
    student_id: &'a str,
    status: &'static str,
    applied_at: String,
    resume_url: &'a str,
    resume_file_name: &'a str,
    source: &'static str,
    has_cover_letter: bool,
    last_reason: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer could not be flushed: {0}")]
    Flush(String),
    #[error("csv output was not valid utf-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Render the applicant list of one job as CSV with a header row.
pub fn render_csv(job: &JobPosting, applications: &[Application]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for application in applications {
        let last_reason = application
            .status_history
            .last()
            .and_then(|entry| entry.reason.as_deref())
            .unwrap_or_default();
        writer.serialize(ApplicantRow {
            application_id: &application.id.0,
            job_id: &job.id.0,
            job_title: &job.title,
            student_id: &application.student().0,
            status: application.status.label(),
            applied_at: application.applied_at.to_rfc3339(),
            resume_url: &application.resume.url,
            resume_file_name: &application.resume.file_name,
            source: application.metadata.source.label(),
            has_cover_letter: application.cover_letter.is_some(),
            last_reason,
        })?;
    }

    if applications.is_empty() {
        writer.write_record([
            "application_id",
            "job_id",
            "job_title",
            "student_id",
            "status",
            "applied_at",
            "resume_url",
            "resume_file_name",
            "source",
            "has_cover_letter",
            "last_reason",
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Flush(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::domain::{
        ApplicationId, ApplicationKey, JobId, JobStatus, ResumeRef, SourceChannel,
        SubmissionMetadata, UserId,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn job() -> JobPosting {
        let created = Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap();
        JobPosting {
            id: JobId("job-7".to_string()),
            title: "QA Engineer, Graduate".to_string(),
            created_by: UserId("rec-7".to_string()),
            status: JobStatus::Active,
            expires_at: created + Duration::days(30),
            created_at: created,
        }
    }

    #[test]
    fn empty_export_still_has_header() {
        let csv = render_csv(&job(), &[]).expect("renders");
        assert!(csv.starts_with("application_id,job_id,job_title"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn rows_quote_titles_with_commas() {
        let application = Application::new(
            ApplicationId("app-000042".to_string()),
            ApplicationKey {
                job: JobId("job-7".to_string()),
                student: UserId("stu-3".to_string()),
            },
            ResumeRef {
                url: "memory://resumes/job-7/stu-3/cv.pdf".to_string(),
                file_name: "cv.pdf".to_string(),
                size_bytes: 100,
            },
            Some("Hello".to_string()),
            SubmissionMetadata {
                ip_address: None,
                user_agent: None,
                source: SourceChannel::Mobile,
            },
            Utc.with_ymd_and_hms(2025, 2, 3, 10, 0, 0).unwrap(),
        );

        let csv = render_csv(&job(), &[application]).expect("renders");
        let mut lines = csv.lines();
        assert!(lines.next().expect("header").contains("last_reason"));
        let row = lines.next().expect("row");
        assert!(row.starts_with("app-000042,job-7,\"QA Engineer, Graduate\",stu-3,pending"));
        assert!(row.contains(",mobile,true,"));
    }
}
