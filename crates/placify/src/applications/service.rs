use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::domain::{
    Actor, Application, ApplicationId, ApplicationKey, ApplicationStatus, JobId, JobPosting,
    SubmissionMetadata, UserId, UserRole,
};
use super::export;
use super::lifecycle::{self, LifecycleError, Transition};
use super::notifications::{Notification, NotificationPublisher, Notifier};
use super::query::{paginate, ApplicationPage, ApplicationQuery};
use super::repository::{ApplicationRepository, ApplicationScope, Directory, RepositoryError};
use super::storage::{
    validate_cover_letter, ResumeStore, ResumeUpload, StorageError, UploadPolicy, ValidationError,
};

/// Service composing the repository, directory lookups, resume storage, and
/// notification side effects around the lifecycle rules.
pub struct ApplicationService<R, N> {
    repository: Arc<R>,
    directory: Arc<dyn Directory>,
    resumes: Arc<dyn ResumeStore>,
    notifier: Notifier<N>,
    uploads: UploadPolicy,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Result of a recruiter status update. `changed` is false when the
/// application already had the requested status.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub application: Application,
    pub changed: bool,
}

impl<R, N> ApplicationService<R, N>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<dyn Directory>,
        resumes: Arc<dyn ResumeStore>,
        publisher: Arc<N>,
        uploads: UploadPolicy,
    ) -> Self {
        Self {
            repository,
            directory,
            resumes,
            notifier: Notifier::new(publisher),
            uploads,
        }
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        self.uploads
    }

    /// Submit a resume against a job on behalf of a student.
    ///
    /// The resume is stored before the application is written, so a storage
    /// failure leaves no record behind.
    pub fn submit(
        &self,
        job_id: &JobId,
        actor: &Actor,
        resume: ResumeUpload,
        cover_letter: Option<String>,
        metadata: SubmissionMetadata,
    ) -> Result<Application, ApplicationServiceError> {
        if actor.role != UserRole::Student {
            return Err(ApplicationServiceError::Forbidden(
                "only students can apply to jobs",
            ));
        }

        let cover_letter = cover_letter
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        validate_cover_letter(cover_letter.as_deref())?;
        self.uploads.validate(&resume)?;

        let now = Utc::now();
        let job = self.require_job(job_id)?;
        if !job.accepts_applications(now) {
            return Err(ApplicationServiceError::Expired);
        }

        self.directory
            .user(&actor.id)?
            .ok_or(ApplicationServiceError::NotFound("student"))?;

        let key = ApplicationKey {
            job: job.id.clone(),
            student: actor.id.clone(),
        };
        if self.repository.find_by_key(&key)?.is_some() {
            return Err(ApplicationServiceError::Duplicate);
        }

        let resume_ref = self.resumes.store(&key, &resume)?;
        let application = Application::new(
            next_application_id(),
            key,
            resume_ref,
            cover_letter,
            metadata,
            now,
        );

        let stored = self
            .repository
            .insert(application)
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationServiceError::Duplicate,
                other => other.into(),
            })?;

        info!(
            application_id = %stored.id.0,
            job_id = %job.id.0,
            student_id = %actor.id.0,
            "application submitted"
        );
        self.notifier
            .dispatch(Notification::new_application(&job, &stored));

        Ok(stored)
    }

    /// Recruiter-facing status change, restricted to `reviewed` and `rejected`.
    pub fn update_status(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
        target: ApplicationStatus,
        reason: Option<String>,
    ) -> Result<StatusUpdate, ApplicationServiceError> {
        let (application, job) = self.require_reviewable(application_id, actor)?;
        self.apply_status(application, &job, actor, target, reason)
    }

    /// Same as [`Self::update_status`] for a status label taken off the wire.
    /// Ownership is checked before the label is parsed.
    pub fn update_status_label(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
        label: &str,
        reason: Option<String>,
    ) -> Result<StatusUpdate, ApplicationServiceError> {
        let (application, job) = self.require_reviewable(application_id, actor)?;
        let target = ApplicationStatus::parse(label)
            .ok_or_else(|| ApplicationServiceError::InvalidStatus(label.to_string()))?;
        self.apply_status(application, &job, actor, target, reason)
    }

    fn require_reviewable(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<(Application, JobPosting), ApplicationServiceError> {
        let application = self.require_application(application_id)?;
        let job = self.require_job(application.job())?;
        if job.created_by != actor.id {
            return Err(ApplicationServiceError::Forbidden(
                "only the recruiter who posted this job can update its applications",
            ));
        }
        Ok((application, job))
    }

    fn apply_status(
        &self,
        mut application: Application,
        job: &JobPosting,
        actor: &Actor,
        target: ApplicationStatus,
        reason: Option<String>,
    ) -> Result<StatusUpdate, ApplicationServiceError> {
        if !matches!(
            target,
            ApplicationStatus::Reviewed | ApplicationStatus::Rejected
        ) {
            return Err(ApplicationServiceError::InvalidStatus(
                target.label().to_string(),
            ));
        }

        let from = application.status;
        match lifecycle::set_status(&mut application, target, &actor.id, reason, Utc::now())? {
            Transition::AlreadySet => Ok(StatusUpdate {
                application,
                changed: false,
            }),
            Transition::Applied => {
                self.repository.update(application.clone())?;
                info!(
                    application_id = %application.id.0,
                    from = from.label(),
                    to = target.label(),
                    actor = %actor.id.0,
                    "application status updated"
                );
                self.notifier
                    .dispatch(Notification::status_changed(job, &application));
                Ok(StatusUpdate {
                    application,
                    changed: true,
                })
            }
        }
    }

    /// Student-initiated withdrawal of a pending application.
    pub fn withdraw(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Application, ApplicationServiceError> {
        let mut application = self.require_application(application_id)?;
        if application.student() != &actor.id {
            return Err(ApplicationServiceError::Forbidden(
                "only the applicant can withdraw this application",
            ));
        }

        lifecycle::withdraw(&mut application, &actor.id, reason, Utc::now())?;
        self.repository.update(application.clone())?;
        info!(
            application_id = %application.id.0,
            student_id = %actor.id.0,
            "application withdrawn"
        );

        match self.directory.job(application.job()) {
            Ok(Some(job)) => self
                .notifier
                .dispatch(Notification::withdrawn(&job, &application)),
            Ok(None) => {}
            Err(err) => warn!(
                application_id = %application.id.0,
                error = %err,
                "skipping withdrawal notification: job lookup failed"
            ),
        }

        Ok(application)
    }

    /// Fetch one application for its applicant, the owning recruiter, or an admin.
    pub fn get(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<Application, ApplicationServiceError> {
        let application = self.require_application(application_id)?;
        if actor.is_admin() || application.student() == &actor.id {
            return Ok(application);
        }

        let owns_job = self
            .directory
            .job(application.job())?
            .is_some_and(|job| job.created_by == actor.id);
        if owns_job {
            Ok(application)
        } else {
            Err(ApplicationServiceError::Forbidden(
                "not allowed to view this application",
            ))
        }
    }

    pub fn list_for_student(
        &self,
        actor: &Actor,
        query: &ApplicationQuery,
    ) -> Result<ApplicationPage, ApplicationServiceError> {
        if actor.role != UserRole::Student {
            return Err(ApplicationServiceError::Forbidden(
                "only students have personal applications",
            ));
        }
        let applications = self
            .repository
            .list(&ApplicationScope::Student(actor.id.clone()))?;
        Ok(paginate(applications, query))
    }

    pub fn list_for_job(
        &self,
        job_id: &JobId,
        actor: &Actor,
        query: &ApplicationQuery,
    ) -> Result<ApplicationPage, ApplicationServiceError> {
        let job = self.require_owned_job(job_id, actor)?;
        let applications = self
            .repository
            .list(&ApplicationScope::Jobs(vec![job.id]))?;
        Ok(paginate(applications, query))
    }

    /// Applications across every job the calling recruiter posted.
    pub fn list_for_recruiter(
        &self,
        actor: &Actor,
        query: &ApplicationQuery,
    ) -> Result<ApplicationPage, ApplicationServiceError> {
        if actor.role == UserRole::Student {
            return Err(ApplicationServiceError::Forbidden(
                "only recruiters can list applications for their jobs",
            ));
        }
        let jobs = self
            .directory
            .jobs_created_by(&actor.id)?
            .into_iter()
            .map(|job| job.id)
            .collect();
        let applications = self.repository.list(&ApplicationScope::Jobs(jobs))?;
        Ok(paginate(applications, query))
    }

    pub fn export_job_csv(
        &self,
        job_id: &JobId,
        actor: &Actor,
    ) -> Result<String, ApplicationServiceError> {
        let job = self.require_owned_job(job_id, actor)?;
        let mut applications = self
            .repository
            .list(&ApplicationScope::Jobs(vec![job.id.clone()]))?;
        applications.sort_by(|left, right| left.applied_at.cmp(&right.applied_at));
        export::render_csv(&job, &applications)
            .map_err(|err| ApplicationServiceError::System(err.to_string()))
    }

    /// Cascade hook for job deletion.
    pub fn remove_job_applications(&self, job_id: &JobId) -> Result<usize, ApplicationServiceError> {
        let removed = self.repository.delete_for_jobs(std::slice::from_ref(job_id))?;
        info!(job_id = %job_id.0, removed, "removed applications for deleted job");
        Ok(removed)
    }

    /// Cascade hook for user deletion.
    pub fn remove_student_applications(
        &self,
        student_id: &UserId,
    ) -> Result<usize, ApplicationServiceError> {
        let removed = self.repository.delete_for_student(student_id)?;
        info!(student_id = %student_id.0, removed, "removed applications for deleted user");
        Ok(removed)
    }

    /// Retention sweep: drop applications tied to jobs created more than
    /// `max_job_age` before `now`.
    pub fn purge_stale(
        &self,
        now: DateTime<Utc>,
        max_job_age: Duration,
    ) -> Result<usize, ApplicationServiceError> {
        let cutoff = now - max_job_age;
        let jobs = self.directory.jobs_created_before(cutoff)?;
        if jobs.is_empty() {
            return Ok(0);
        }
        let removed = self.repository.delete_for_jobs(&jobs)?;
        info!(%cutoff, jobs = jobs.len(), removed, "retention sweep completed");
        Ok(removed)
    }

    fn require_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Application, ApplicationServiceError> {
        self.repository
            .fetch(application_id)?
            .ok_or(ApplicationServiceError::NotFound("application"))
    }

    fn require_job(&self, job_id: &JobId) -> Result<JobPosting, ApplicationServiceError> {
        self.directory
            .job(job_id)?
            .ok_or(ApplicationServiceError::NotFound("job"))
    }

    fn require_owned_job(
        &self,
        job_id: &JobId,
        actor: &Actor,
    ) -> Result<JobPosting, ApplicationServiceError> {
        let job = self.require_job(job_id)?;
        if actor.is_admin() || job.created_by == actor.id {
            Ok(job)
        } else {
            Err(ApplicationServiceError::Forbidden(
                "only the recruiter who posted this job can view its applications",
            ))
        }
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("you have already applied to this job")]
    Duplicate,
    #[error("this job is no longer accepting applications")]
    Expired,
    #[error("status '{0}' cannot be set here; use reviewed or rejected")]
    InvalidStatus(String),
    #[error(transparent)]
    InvalidTransition(#[from] LifecycleError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("system error: {0}")]
    System(String),
}

impl ApplicationServiceError {
    /// Stable machine-readable code surfaced to API clients.
    pub const fn code(&self) -> &'static str {
        match self {
            ApplicationServiceError::NotFound(_) => "NOT_FOUND",
            ApplicationServiceError::Forbidden(_) => "FORBIDDEN",
            ApplicationServiceError::Duplicate => "DUPLICATE_APPLICATION",
            ApplicationServiceError::Expired => "JOB_EXPIRED",
            ApplicationServiceError::InvalidStatus(_) => "INVALID_STATUS",
            ApplicationServiceError::InvalidTransition(_) => "INVALID_TRANSITION",
            ApplicationServiceError::Validation(_) => "VALIDATION_FAILED",
            ApplicationServiceError::System(_) => "SYSTEM_ERROR",
        }
    }
}

impl From<RepositoryError> for ApplicationServiceError {
    fn from(value: RepositoryError) -> Self {
        Self::System(value.to_string())
    }
}

impl From<StorageError> for ApplicationServiceError {
    fn from(value: StorageError) -> Self {
        Self::System(value.to_string())
    }
}
