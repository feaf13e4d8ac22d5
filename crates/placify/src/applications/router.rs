use std::sync::Arc;

use axum::{
    async_trait,
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::{BytesRejection, JsonRejection, QueryRejection},
        DefaultBodyLimit, FromRequestParts, Path, Query, State,
    },
    body::Bytes,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    Actor, ApplicationId, JobId, SourceChannel, SubmissionMetadata, UserId, UserRole,
};
use super::notifications::NotificationPublisher;
use super::query::ApplicationQuery;
use super::repository::ApplicationRepository;
use super::service::{ApplicationService, ApplicationServiceError};
use super::storage::{ResumeUpload, ValidationError};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
const MAX_ID_LEN: usize = 64;

/// Router builder exposing the application lifecycle endpoints.
pub fn application_router<R, N>(service: Arc<ApplicationService<R, N>>) -> Router
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let body_limit = usize::try_from(service.upload_policy().max_resume_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/api/jobs/:job_id/apply", post(submit_handler::<R, N>))
        .route(
            "/api/applications/student",
            get(student_applications_handler::<R, N>),
        )
        .route(
            "/api/applications/recruiter",
            get(recruiter_applications_handler::<R, N>),
        )
        .route(
            "/api/applications/job/:job_id",
            get(job_applications_handler::<R, N>),
        )
        .route(
            "/api/applications/job/:job_id/export",
            get(export_handler::<R, N>),
        )
        .route(
            "/api/applications/:application_id",
            get(get_handler::<R, N>).patch(update_status_handler::<R, N>),
        )
        .route(
            "/api/applications/:application_id/withdraw",
            patch(withdraw_handler::<R, N>),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

type SharedService<R, N> = Arc<ApplicationService<R, N>>;

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub(crate) async fn submit_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(job_id): Path<String>,
    actor: Actor,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApplicationServiceError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let job_id = JobId(checked_id(job_id)?);
    let multipart = multipart
        .map_err(|rejection| ValidationError::MalformedRequest(rejection.body_text()))?;
    let form = read_application_form(multipart).await?;
    let resume = form.resume.ok_or(ValidationError::MissingResume)?;
    let metadata = SubmissionMetadata {
        ip_address: client_ip(&headers),
        user_agent: header_value(&headers, header::USER_AGENT.as_str()),
        source: form.source,
    };

    let application = service.submit(&job_id, &actor, resume, form.cover_letter, metadata)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Application submitted successfully",
            "application": application.summary(),
        })),
    )
        .into_response())
}

pub(crate) async fn update_status_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
    actor: Actor,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Response, ApplicationServiceError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let application_id = ApplicationId(checked_id(application_id)?);
    let Json(request) =
        payload.map_err(|rejection| ValidationError::MalformedRequest(rejection.body_text()))?;
    let update =
        service.update_status_label(&application_id, &actor, &request.status, request.reason)?;
    let message = if update.changed {
        "Application status updated"
    } else {
        "Application status already set"
    };
    Ok((
        StatusCode::OK,
        Json(json!({
            "message": message,
            "application": update.application,
        })),
    )
        .into_response())
}

pub(crate) async fn withdraw_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
    actor: Actor,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApplicationServiceError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let application_id = ApplicationId(checked_id(application_id)?);
    let reason = withdraw_reason(body)?;

    let application = service.withdraw(&application_id, &actor, reason)?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Application withdrawn",
            "application": application,
        })),
    )
        .into_response())
}

pub(crate) async fn get_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
    actor: Actor,
) -> Result<Response, ApplicationServiceError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let application_id = ApplicationId(checked_id(application_id)?);
    let application = service.get(&application_id, &actor)?;
    Ok((StatusCode::OK, Json(application)).into_response())
}

pub(crate) async fn student_applications_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    actor: Actor,
    query: Result<Query<ApplicationQuery>, QueryRejection>,
) -> Result<Response, ApplicationServiceError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let query = list_query(query)?;
    let page = service.list_for_student(&actor, &query)?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

pub(crate) async fn recruiter_applications_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    actor: Actor,
    query: Result<Query<ApplicationQuery>, QueryRejection>,
) -> Result<Response, ApplicationServiceError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let query = list_query(query)?;
    let page = service.list_for_recruiter(&actor, &query)?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

pub(crate) async fn job_applications_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(job_id): Path<String>,
    actor: Actor,
    query: Result<Query<ApplicationQuery>, QueryRejection>,
) -> Result<Response, ApplicationServiceError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let job_id = JobId(checked_id(job_id)?);
    let query = list_query(query)?;
    let page = service.list_for_job(&job_id, &actor, &query)?;
    Ok((StatusCode::OK, Json(page)).into_response())
}

pub(crate) async fn export_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(job_id): Path<String>,
    actor: Actor,
) -> Result<Response, ApplicationServiceError>
where
    R: ApplicationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    let job_id = JobId(checked_id(job_id)?);
    let csv = service.export_job_csv(&job_id, &actor)?;
    let disposition = format!("attachment; filename=\"applications-{}.csv\"", job_id.0);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

#[derive(Debug, Default)]
struct ApplicationForm {
    resume: Option<ResumeUpload>,
    cover_letter: Option<String>,
    source: SourceChannel,
}

async fn read_application_form(
    mut multipart: Multipart,
) -> Result<ApplicationForm, ValidationError> {
    let mut form = ApplicationForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed_multipart)? {
        match field.name().unwrap_or_default() {
            "resume" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| "resume".to_string());
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(malformed_multipart)?;
                form.resume = Some(ResumeUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "coverLetter" => {
                form.cover_letter = Some(field.text().await.map_err(malformed_multipart)?);
            }
            "source" => {
                let raw = field.text().await.map_err(malformed_multipart)?;
                form.source = SourceChannel::parse(&raw).ok_or_else(|| {
                    ValidationError::MalformedRequest(format!("unknown source channel '{raw}'"))
                })?;
            }
            _ => {}
        }
    }

    Ok(form)
}

/// The withdraw body is optional, but a body that is present must be a valid
/// `WithdrawRequest`.
fn withdraw_reason(
    body: Result<Bytes, BytesRejection>,
) -> Result<Option<String>, ValidationError> {
    let body = body.map_err(|rejection| ValidationError::MalformedRequest(rejection.body_text()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let request: WithdrawRequest = serde_json::from_slice(&body)
        .map_err(|err| ValidationError::MalformedRequest(format!("invalid withdraw body: {err}")))?;
    Ok(request.reason)
}

fn malformed_multipart(err: MultipartError) -> ValidationError {
    ValidationError::MalformedRequest(err.body_text())
}

fn list_query(
    query: Result<Query<ApplicationQuery>, QueryRejection>,
) -> Result<ApplicationQuery, ValidationError> {
    query
        .map(|Query(query)| query)
        .map_err(|rejection| ValidationError::MalformedRequest(rejection.body_text()))
}

/// Accept identifiers made of ASCII letters, digits, `-` and `_`.
fn checked_id(raw: String) -> Result<String, ValidationError> {
    let valid = !raw.is_empty()
        && raw.len() <= MAX_ID_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(raw)
    } else {
        Err(ValidationError::MalformedId(raw))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next().map(|hop| hop.trim().to_string()))
        .filter(|hop| !hop.is_empty())
        .or_else(|| header_value(headers, "x-real-ip"))
}

/// Rejection produced when the gateway identity headers are missing or invalid.
#[derive(Debug)]
pub struct MissingIdentity(&'static str);

impl IntoResponse for MissingIdentity {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": "UNAUTHORIZED", "message": self.0 }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = MissingIdentity;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(&parts.headers, USER_ID_HEADER)
            .ok_or(MissingIdentity("missing x-user-id header"))?;
        let role = header_value(&parts.headers, USER_ROLE_HEADER)
            .as_deref()
            .and_then(UserRole::parse)
            .ok_or(MissingIdentity("missing or unknown x-user-role header"))?;
        Ok(Actor {
            id: UserId(id),
            role,
        })
    }
}

impl ApplicationServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApplicationServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ApplicationServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApplicationServiceError::Duplicate => StatusCode::CONFLICT,
            ApplicationServiceError::Expired
            | ApplicationServiceError::InvalidStatus(_)
            | ApplicationServiceError::InvalidTransition(_)
            | ApplicationServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ApplicationServiceError::System(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApplicationServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "application request failed");
        }
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
