//! Status transition rules for applications.
//!
//! Every mutation goes through [`set_status`] or [`withdraw`], which append to
//! the audit history. Creation never records a transition: `pending` is the
//! implicit starting point.

use chrono::{DateTime, Utc};

use super::domain::{Application, ApplicationStatus, StatusChange, UserId};

/// Reason stored when a student withdraws without explaining why.
pub const DEFAULT_WITHDRAWAL_REASON: &str = "Withdrawn by applicant";

/// Actor id stamped on transitions the service performs on its own behalf.
pub const SYSTEM_ACTOR: &str = "system";

pub fn system_actor() -> UserId {
    UserId(SYSTEM_ACTOR.to_string())
}

/// Outcome of a status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    AlreadySet,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot move application from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

pub fn can_withdraw(application: &Application) -> bool {
    application.status == ApplicationStatus::Pending
}

/// Withdraw a pending application on behalf of `actor`.
pub fn withdraw(
    application: &mut Application,
    actor: &UserId,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if !can_withdraw(application) {
        return Err(LifecycleError::InvalidTransition {
            from: application.status,
            to: ApplicationStatus::Withdrawn,
        });
    }

    let reason = normalize_reason(reason).unwrap_or_else(|| DEFAULT_WITHDRAWAL_REASON.to_string());
    application.withdrawal_reason = Some(reason.clone());
    apply(
        application,
        ApplicationStatus::Withdrawn,
        actor,
        Some(reason),
        now,
    );
    Ok(())
}

/// Move an application to `target`.
///
/// Requests for the current status short-circuit to [`Transition::AlreadySet`]
/// without touching the history. Restricting which targets a caller may ask
/// for is left to the caller.
pub fn set_status(
    application: &mut Application,
    target: ApplicationStatus,
    actor: &UserId,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    if application.status == target {
        return Ok(Transition::AlreadySet);
    }

    if application.status != ApplicationStatus::Pending || target == ApplicationStatus::Pending {
        return Err(LifecycleError::InvalidTransition {
            from: application.status,
            to: target,
        });
    }

    let reason = normalize_reason(reason);
    if target == ApplicationStatus::Withdrawn {
        application.withdrawal_reason = reason.clone();
    }
    apply(application, target, actor, reason, now);
    Ok(Transition::Applied)
}

fn apply(
    application: &mut Application,
    target: ApplicationStatus,
    actor: &UserId,
    reason: Option<String>,
    now: DateTime<Utc>,
) {
    application.status = target;
    match target {
        ApplicationStatus::Reviewed => application.reviewed_at = Some(now),
        ApplicationStatus::Rejected => application.rejected_at = Some(now),
        ApplicationStatus::Withdrawn => application.withdrawn_at = Some(now),
        ApplicationStatus::Pending => {}
    }
    application.status_history.push(StatusChange {
        status: target,
        changed_at: now,
        updated_by: actor.clone(),
        reason,
    });
    application.updated_at = now;
}

fn normalize_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
