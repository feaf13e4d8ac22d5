use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{Application, ApplicationId, ApplicationStatus, JobId, JobPosting, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewApplication,
    StatusChanged,
    ApplicationWithdrawn,
}

/// User-facing message produced as a side effect of a lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub application_id: ApplicationId,
    pub job_id: JobId,
}

impl Notification {
    pub fn new_application(job: &JobPosting, application: &Application) -> Self {
        Self {
            recipient: job.created_by.clone(),
            kind: NotificationKind::NewApplication,
            title: "New application received".to_string(),
            message: format!("A new application was submitted for {}.", job.title),
            application_id: application.id.clone(),
            job_id: job.id.clone(),
        }
    }

    pub fn status_changed(job: &JobPosting, application: &Application) -> Self {
        let message = match application.status {
            ApplicationStatus::Reviewed => {
                format!("Your application for {} has been reviewed.", job.title)
            }
            ApplicationStatus::Rejected => format!(
                "Your application for {} was not selected to move forward.",
                job.title
            ),
            other => format!(
                "Your application for {} is now {}.",
                job.title,
                other.label()
            ),
        };

        Self {
            recipient: application.student().clone(),
            kind: NotificationKind::StatusChanged,
            title: "Application status updated".to_string(),
            message,
            application_id: application.id.clone(),
            job_id: job.id.clone(),
        }
    }

    pub fn withdrawn(job: &JobPosting, application: &Application) -> Self {
        Self {
            recipient: job.created_by.clone(),
            kind: NotificationKind::ApplicationWithdrawn,
            title: "Application withdrawn".to_string(),
            message: format!("An applicant withdrew from {}.", job.title),
            application_id: application.id.clone(),
            job_id: job.id.clone(),
        }
    }
}

/// Outbound hook for user notifications (in-app inbox, e-mail adapters).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget wrapper around a [`NotificationPublisher`].
///
/// Delivery runs on a detached task when a tokio runtime is available and
/// inline otherwise. Failures are logged and never reach the caller.
pub struct Notifier<N> {
    publisher: Arc<N>,
}

impl<N> Clone for Notifier<N> {
    fn clone(&self) -> Self {
        Self {
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<N> Notifier<N>
where
    N: NotificationPublisher + 'static,
{
    pub fn new(publisher: Arc<N>) -> Self {
        Self { publisher }
    }

    pub fn dispatch(&self, notification: Notification) {
        let publisher = Arc::clone(&self.publisher);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { deliver(publisher.as_ref(), notification) });
            }
            Err(_) => deliver(publisher.as_ref(), notification),
        }
    }
}

fn deliver<N: NotificationPublisher + ?Sized>(publisher: &N, notification: Notification) {
    let kind = notification.kind;
    let recipient = notification.recipient.0.clone();
    let application_id = notification.application_id.0.clone();
    match publisher.publish(notification) {
        Ok(()) => debug!(?kind, %recipient, %application_id, "notification delivered"),
        Err(err) => warn!(
            ?kind,
            %recipient,
            %application_id,
            error = %err,
            "notification delivery failed"
        ),
    }
}
