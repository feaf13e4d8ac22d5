use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationKey, JobId, JobPosting, UserAccount, UserId,
};

/// Which applications a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationScope {
    Student(UserId),
    Jobs(Vec<JobId>),
}

impl ApplicationScope {
    pub fn contains(&self, application: &Application) -> bool {
        match self {
            ApplicationScope::Student(student) => application.student() == student,
            ApplicationScope::Jobs(jobs) => jobs.contains(application.job()),
        }
    }
}

/// Storage abstraction for application documents.
///
/// Implementations must enforce uniqueness of the `(job, student)` pair on
/// insert and report a violation as [`RepositoryError::Conflict`].
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn update(&self, application: Application) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn find_by_key(&self, key: &ApplicationKey) -> Result<Option<Application>, RepositoryError>;
    fn list(&self, scope: &ApplicationScope) -> Result<Vec<Application>, RepositoryError>;
    fn delete_for_jobs(&self, jobs: &[JobId]) -> Result<usize, RepositoryError>;
    fn delete_for_student(&self, student: &UserId) -> Result<usize, RepositoryError>;
}

/// Read-only view of the users and jobs an application refers to.
pub trait Directory: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError>;
    fn job(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError>;
    fn jobs_created_by(&self, recruiter: &UserId) -> Result<Vec<JobPosting>, RepositoryError>;
    fn jobs_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
