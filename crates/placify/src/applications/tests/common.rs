use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{Duration, Utc};
use serde_json::Value;

use crate::applications::domain::{
    Actor, Application, ApplicationId, ApplicationKey, JobId, JobPosting, JobStatus, UserAccount,
    UserId, UserRole,
};
use crate::applications::memory::{
    InMemoryApplicationRepository, InMemoryDirectory, InMemoryNotificationInbox,
    InMemoryResumeStore,
};
use crate::applications::notifications::{
    Notification, NotificationError, NotificationPublisher,
};
use crate::applications::repository::{
    ApplicationRepository, ApplicationScope, RepositoryError,
};
use crate::applications::service::ApplicationService;
use crate::applications::storage::{
    ResumeStore, ResumeUpload, StorageError, UploadPolicy,
};
use crate::applications::{application_router, ResumeRef, USER_ID_HEADER, USER_ROLE_HEADER};

pub(super) const BOUNDARY: &str = "placify-test-boundary";

pub(super) type MemoryService = ApplicationService<InMemoryApplicationRepository, InMemoryNotificationInbox>;

pub(super) struct Fixture {
    pub(super) service: Arc<MemoryService>,
    pub(super) repository: Arc<InMemoryApplicationRepository>,
    pub(super) directory: Arc<InMemoryDirectory>,
    pub(super) resumes: Arc<InMemoryResumeStore>,
    pub(super) inbox: Arc<InMemoryNotificationInbox>,
}

impl Fixture {
    pub(super) fn router(&self) -> axum::Router {
        application_router(self.service.clone())
    }
}

pub(super) fn student() -> Actor {
    Actor::new("stu-1", UserRole::Student)
}

pub(super) fn other_student() -> Actor {
    Actor::new("stu-2", UserRole::Student)
}

pub(super) fn recruiter() -> Actor {
    Actor::new("rec-a", UserRole::Recruiter)
}

pub(super) fn other_recruiter() -> Actor {
    Actor::new("rec-b", UserRole::Recruiter)
}

pub(super) fn admin() -> Actor {
    Actor::new("adm-1", UserRole::Admin)
}

pub(super) fn open_job() -> JobId {
    JobId("job-a".to_string())
}

pub(super) fn other_job() -> JobId {
    JobId("job-b".to_string())
}

pub(super) fn expired_job() -> JobId {
    JobId("job-expired".to_string())
}

pub(super) fn inactive_job() -> JobId {
    JobId("job-inactive".to_string())
}

fn job(id: &str, owner: &str, status: JobStatus, expires_in: Duration, age: Duration) -> JobPosting {
    let now = Utc::now();
    JobPosting {
        id: JobId(id.to_string()),
        title: format!("Role {id}"),
        created_by: UserId(owner.to_string()),
        status,
        expires_at: now + expires_in,
        created_at: now - age,
    }
}

pub(super) fn seeded_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::default();
    for (id, role) in [
        ("stu-1", UserRole::Student),
        ("stu-2", UserRole::Student),
        ("rec-a", UserRole::Recruiter),
        ("rec-b", UserRole::Recruiter),
        ("adm-1", UserRole::Admin),
    ] {
        directory.upsert_user(UserAccount {
            id: UserId(id.to_string()),
            name: id.to_uppercase(),
            role,
        })
        .expect("seed user");
    }
    directory.upsert_job(job(
        "job-a",
        "rec-a",
        JobStatus::Active,
        Duration::days(30),
        Duration::days(2),
    ))
    .expect("seed job");
    directory.upsert_job(job(
        "job-b",
        "rec-b",
        JobStatus::Active,
        Duration::days(30),
        Duration::days(400),
    ))
    .expect("seed job");
    directory.upsert_job(job(
        "job-expired",
        "rec-a",
        JobStatus::Active,
        -Duration::days(1),
        Duration::days(40),
    ))
    .expect("seed job");
    directory.upsert_job(job(
        "job-inactive",
        "rec-a",
        JobStatus::Inactive,
        Duration::days(30),
        Duration::days(5),
    ))
    .expect("seed job");
    directory
}

pub(super) fn fixture() -> Fixture {
    fixture_with_policy(UploadPolicy::default())
}

pub(super) fn fixture_with_policy(policy: UploadPolicy) -> Fixture {
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let directory = Arc::new(seeded_directory());
    let resumes = Arc::new(InMemoryResumeStore::default());
    let inbox = Arc::new(InMemoryNotificationInbox::default());
    let service = Arc::new(ApplicationService::new(
        repository.clone(),
        directory.clone(),
        resumes.clone(),
        inbox.clone(),
        policy,
    ));
    Fixture {
        service,
        repository,
        directory,
        resumes,
        inbox,
    }
}

pub(super) fn resume_pdf() -> ResumeUpload {
    ResumeUpload {
        file_name: "cv.pdf".to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: b"%PDF-1.7 resume".to_vec(),
    }
}

/// Submit on behalf of `actor` against `job` with default metadata.
pub(super) fn apply(fixture: &Fixture, job: &JobId, actor: &Actor) -> Application {
    fixture
        .service
        .submit(job, actor, resume_pdf(), None, Default::default())
        .expect("submission succeeds")
}

pub(super) struct FailingResumeStore;

impl ResumeStore for FailingResumeStore {
    fn store(
        &self,
        _key: &ApplicationKey,
        _upload: &ResumeUpload,
    ) -> Result<ResumeRef, StorageError> {
        Err(StorageError::Unavailable("bucket offline".to_string()))
    }
}

pub(super) struct FailingPublisher;

impl NotificationPublisher for FailingPublisher {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("inbox offline".to_string()))
    }
}

/// Simulates the check-then-insert race: the lookup sees nothing, the
/// unique index then refuses the insert.
pub(super) struct RacingRepository;

impl ApplicationRepository for RacingRepository {
    fn insert(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn update(&self, _application: Application) -> Result<(), RepositoryError> {
        Err(RepositoryError::NotFound)
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(None)
    }

    fn find_by_key(&self, _key: &ApplicationKey) -> Result<Option<Application>, RepositoryError> {
        Ok(None)
    }

    fn list(&self, _scope: &ApplicationScope) -> Result<Vec<Application>, RepositoryError> {
        Ok(Vec::new())
    }

    fn delete_for_jobs(&self, _jobs: &[JobId]) -> Result<usize, RepositoryError> {
        Ok(0)
    }

    fn delete_for_student(&self, _student: &UserId) -> Result<usize, RepositoryError> {
        Ok(0)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _application: Application) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_key(&self, _key: &ApplicationKey) -> Result<Option<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _scope: &ApplicationScope) -> Result<Vec<Application>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_for_jobs(&self, _jobs: &[JobId]) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_for_student(&self, _student: &UserId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn with_identity(
    builder: axum::http::request::Builder,
    actor: &Actor,
) -> axum::http::request::Builder {
    builder
        .header(USER_ID_HEADER, actor.id.0.as_str())
        .header(USER_ROLE_HEADER, actor.role.label())
}

pub(super) fn multipart_body(parts: &[(&str, Option<&str>, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
            ),
        }
        if let Some(content_type) = content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) fn apply_request(job: &str, actor: &Actor, body: Vec<u8>) -> Request<Body> {
    with_identity(Request::post(format!("/api/jobs/{job}/apply")), actor)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::USER_AGENT, "placify-tests/1.0")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body(Body::from(body))
        .expect("request builds")
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    actor: &Actor,
    payload: &Value,
) -> Request<Body> {
    with_identity(Request::builder().method(method).uri(uri), actor)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

pub(super) fn get_request(uri: &str, actor: &Actor) -> Request<Body> {
    with_identity(Request::get(uri), actor)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

/// Let detached notification tasks run until `expected` deliveries landed.
pub(super) async fn wait_for_notifications(
    inbox: &InMemoryNotificationInbox,
    expected: usize,
) -> Vec<Notification> {
    for _ in 0..100 {
        let events = inbox.events();
        if events.len() >= expected {
            return events;
        }
        tokio::task::yield_now().await;
    }
    inbox.events()
}
