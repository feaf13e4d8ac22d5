use chrono::{DateTime, Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use placify::applications::{
    ApplicationService, DirectorySeed, InMemoryApplicationRepository, InMemoryDirectory,
    InMemoryNotificationInbox, InMemoryResumeStore, JobId, JobPosting, JobStatus, SeedError,
    UploadPolicy, UserAccount, UserId, UserRole,
};
use placify::error::AppError;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type PlacifyService =
    ApplicationService<InMemoryApplicationRepository, InMemoryNotificationInbox>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Handles kept by the process so the in-memory adapters can be inspected.
pub(crate) struct Backends {
    pub(crate) repository: Arc<InMemoryApplicationRepository>,
    pub(crate) inbox: Arc<InMemoryNotificationInbox>,
    pub(crate) resumes: Arc<InMemoryResumeStore>,
}

pub(crate) fn build_service(
    directory: InMemoryDirectory,
    uploads: UploadPolicy,
) -> (Arc<PlacifyService>, Backends) {
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let inbox = Arc::new(InMemoryNotificationInbox::default());
    let resumes = Arc::new(InMemoryResumeStore::default());
    let service = Arc::new(ApplicationService::new(
        repository.clone(),
        Arc::new(directory),
        resumes.clone(),
        inbox.clone(),
        uploads,
    ));
    (
        service,
        Backends {
            repository,
            inbox,
            resumes,
        },
    )
}

/// Load users and jobs from a JSON seed, or start with an empty directory.
pub(crate) fn load_directory(seed_path: Option<&Path>) -> Result<InMemoryDirectory, AppError> {
    let Some(path) = seed_path else {
        return Ok(InMemoryDirectory::default());
    };
    let raw = std::fs::read_to_string(path)?;
    let directory = InMemoryDirectory::from_json(&raw)?;
    info!(path = %path.display(), "directory seed loaded");
    Ok(directory)
}

/// A small cast used by the demo: one recruiter, two students, one admin and
/// two postings (one open, one already expired).
pub(crate) fn demo_directory(now: DateTime<Utc>) -> Result<InMemoryDirectory, SeedError> {
    let users = [
        ("rec-100", "Riya Recruiter", UserRole::Recruiter),
        ("stu-200", "Sam Student", UserRole::Student),
        ("stu-201", "Alex Applicant", UserRole::Student),
        ("adm-300", "Ada Admin", UserRole::Admin),
    ]
    .into_iter()
    .map(|(id, name, role)| UserAccount {
        id: UserId(id.to_string()),
        name: name.to_string(),
        role,
    })
    .collect();
    let jobs = vec![
        JobPosting {
            id: JobId("job-backend-intern".to_string()),
            title: "Backend Engineering Intern".to_string(),
            created_by: UserId("rec-100".to_string()),
            status: JobStatus::Active,
            expires_at: now + Duration::days(21),
            created_at: now - Duration::days(3),
        },
        JobPosting {
            id: JobId("job-data-analyst".to_string()),
            title: "Graduate Data Analyst".to_string(),
            created_by: UserId("rec-100".to_string()),
            status: JobStatus::Expired,
            expires_at: now - Duration::days(2),
            created_at: now - Duration::days(60),
        },
    ];
    Ok(InMemoryDirectory::from_seed(DirectorySeed { users, jobs })?)
}
