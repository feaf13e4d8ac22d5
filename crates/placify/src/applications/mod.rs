//! Application lifecycle: student submissions, recruiter review, withdrawals,
//! and the audit history that records every transition.

pub mod domain;
pub mod export;
pub mod lifecycle;
pub mod memory;
pub mod notifications;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, Application, ApplicationId, ApplicationKey, ApplicationStatus, ApplicationSummary,
    JobId, JobPosting, JobStatus, ResumeRef, SourceChannel, StatusChange, SubmissionMetadata,
    UserAccount, UserId, UserRole,
};
pub use lifecycle::{LifecycleError, Transition, DEFAULT_WITHDRAWAL_REASON, SYSTEM_ACTOR};
pub use memory::{
    DirectorySeed, InMemoryApplicationRepository, InMemoryDirectory, InMemoryNotificationInbox,
    InMemoryResumeStore, SeedError,
};
pub use notifications::{
    Notification, NotificationError, NotificationKind, NotificationPublisher, Notifier,
};
pub use query::{ApplicationPage, ApplicationQuery, Pagination, StatusCounts};
pub use repository::{ApplicationRepository, ApplicationScope, Directory, RepositoryError};
pub use router::{application_router, USER_ID_HEADER, USER_ROLE_HEADER};
pub use service::{ApplicationService, ApplicationServiceError, StatusUpdate};
pub use storage::{ResumeStore, ResumeUpload, StorageError, UploadPolicy, ValidationError};
