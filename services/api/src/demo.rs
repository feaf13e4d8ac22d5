use crate::infra::{build_service, demo_directory};
use chrono::Utc;
use clap::Args;
use placify::applications::{
    Actor, ApplicationQuery, ApplicationStatus, JobId, ResumeUpload, SourceChannel,
    SubmissionMetadata, UploadPolicy, UserRole,
};
use placify::error::AppError;

/// Two submissions, one status change and one withdrawal.
const EXPECTED_NOTIFICATIONS: usize = 4;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reject the first application instead of marking it reviewed.
    #[arg(long)]
    pub(crate) reject: bool,
    /// Print the recruiter's CSV export at the end of the walkthrough.
    #[arg(long)]
    pub(crate) show_csv: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { reject, show_csv } = args;

    let now = Utc::now();
    let (service, backends) = build_service(demo_directory(now)?, UploadPolicy::default());
    let recruiter = Actor::new("rec-100", UserRole::Recruiter);
    let sam = Actor::new("stu-200", UserRole::Student);
    let alex = Actor::new("stu-201", UserRole::Student);
    let open_job = JobId("job-backend-intern".to_string());
    let closed_job = JobId("job-data-analyst".to_string());

    println!("Placify application lifecycle demo");

    let first = match service.submit(
        &open_job,
        &sam,
        demo_resume("sam-resume.pdf"),
        Some("I have shipped two Rust services during my studies.".to_string()),
        SubmissionMetadata {
            source: SourceChannel::Web,
            ..SubmissionMetadata::default()
        },
    ) {
        Ok(application) => application,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- {} applied to {} -> {} ({})",
        first.student().0,
        first.job().0,
        first.status.label(),
        first.id.0
    );

    match service.submit(&open_job, &sam, demo_resume("sam-resume.pdf"), None, Default::default()) {
        Ok(_) => println!("- Unexpected: duplicate submission accepted"),
        Err(err) => println!("- Second attempt by {}: [{}] {err}", sam.id.0, err.code()),
    }
    match service.submit(&closed_job, &alex, demo_resume("alex.pdf"), None, Default::default()) {
        Ok(_) => println!("- Unexpected: expired posting accepted an application"),
        Err(err) => println!("- {} on {}: [{}] {err}", alex.id.0, closed_job.0, err.code()),
    }

    let second = match service.submit(
        &open_job,
        &alex,
        demo_resume("alex.pdf"),
        None,
        SubmissionMetadata {
            source: SourceChannel::Mobile,
            ..SubmissionMetadata::default()
        },
    ) {
        Ok(application) => application,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- {} applied to {} -> {}",
        second.student().0,
        second.job().0,
        second.status.label()
    );

    let target = if reject {
        ApplicationStatus::Rejected
    } else {
        ApplicationStatus::Reviewed
    };
    match service.update_status(
        &first.id,
        &recruiter,
        target,
        Some("Portfolio reviewed by hiring panel".to_string()),
    ) {
        Ok(update) => println!(
            "- {} set {} to {} (history entries: {})",
            recruiter.id.0,
            update.application.id.0,
            update.application.status.label(),
            update.application.status_history.len()
        ),
        Err(err) => println!("  Status update failed: {err}"),
    }
    match service.update_status(&first.id, &recruiter, target, None) {
        Ok(update) if !update.changed => {
            println!("- Repeating the same status is a no-op")
        }
        Ok(_) => println!("- Unexpected: repeated status recorded twice"),
        Err(err) => println!("  Status update failed: {err}"),
    }

    match service.withdraw(&first.id, &sam, Some("Found another role".to_string())) {
        Ok(_) => println!("- Unexpected: processed application was withdrawn"),
        Err(err) => println!("- {} withdrawing {}: [{}] {err}", sam.id.0, first.id.0, err.code()),
    }
    match service.withdraw(&second.id, &alex, None) {
        Ok(application) => println!(
            "- {} withdrew {} ({})",
            alex.id.0,
            application.id.0,
            application.withdrawal_reason.as_deref().unwrap_or_default()
        ),
        Err(err) => println!("  Withdrawal failed: {err}"),
    }

    match service.list_for_job(&open_job, &recruiter, &ApplicationQuery::default()) {
        Ok(page) => println!(
            "\nApplicants for {}: {} total | {} pending | {} reviewed | {} rejected | {} withdrawn",
            open_job.0,
            page.counts.total,
            page.counts.pending,
            page.counts.reviewed,
            page.counts.rejected,
            page.counts.withdrawn
        ),
        Err(err) => println!("  Listing failed: {err}"),
    }

    // Deliveries run on detached tasks; give them a chance to land.
    for _ in 0..100 {
        if backends.inbox.events().len() >= EXPECTED_NOTIFICATIONS {
            break;
        }
        tokio::task::yield_now().await;
    }
    println!("Notifications delivered:");
    for notification in backends.inbox.events() {
        println!("  - to {}: {}", notification.recipient.0, notification.title);
    }
    println!(
        "Stored records: {} applications | {} resumes",
        backends.repository.len(),
        backends.resumes.len()
    );

    if show_csv {
        match service.export_job_csv(&open_job, &recruiter) {
            Ok(csv) => println!("\n{csv}"),
            Err(err) => println!("  Export failed: {err}"),
        }
    }

    Ok(())
}

fn demo_resume(file_name: &str) -> ResumeUpload {
    ResumeUpload {
        file_name: file_name.to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: b"%PDF-1.7\n% demo resume\n".to_vec(),
    }
}
