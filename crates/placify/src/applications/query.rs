use serde::{Deserialize, Serialize};

use super::domain::{Application, ApplicationStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter and pagination parameters shared by every listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ApplicationQuery {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ApplicationQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: u32,
}

/// Per-status bucket counts over an unfiltered scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub reviewed: usize,
    pub rejected: usize,
    pub withdrawn: usize,
}

impl StatusCounts {
    pub fn tally<'a>(applications: impl IntoIterator<Item = &'a Application>) -> Self {
        applications
            .into_iter()
            .fold(Self::default(), |mut counts, application| {
                counts.total += 1;
                match application.status {
                    ApplicationStatus::Pending => counts.pending += 1,
                    ApplicationStatus::Reviewed => counts.reviewed += 1,
                    ApplicationStatus::Rejected => counts.rejected += 1,
                    ApplicationStatus::Withdrawn => counts.withdrawn += 1,
                }
                counts
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationPage {
    pub applications: Vec<Application>,
    pub pagination: Pagination,
    pub counts: StatusCounts,
}

/// Filter, order newest first, and slice one page out of `applications`.
pub fn paginate(mut applications: Vec<Application>, query: &ApplicationQuery) -> ApplicationPage {
    let counts = StatusCounts::tally(&applications);

    if let Some(status) = query.status {
        applications.retain(|application| application.status == status);
    }
    applications.sort_by(|left, right| {
        right
            .applied_at
            .cmp(&left.applied_at)
            .then_with(|| right.id.cmp(&left.id))
    });

    let page = query.page();
    let limit = query.limit();
    let total = applications.len();
    let total_pages = total.div_ceil(limit as usize) as u32;
    let skip = (page as usize - 1).saturating_mul(limit as usize);

    let applications = applications
        .into_iter()
        .skip(skip)
        .take(limit as usize)
        .collect();

    ApplicationPage {
        applications,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages,
        },
        counts,
    }
}
