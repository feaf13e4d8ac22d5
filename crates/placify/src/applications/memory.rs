//! In-process adapters for every storage and delivery seam.
//!
//! The API service runs on these until a database-backed adapter exists, and
//! the test suites use them as fixtures.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::domain::{
    Application, ApplicationId, ApplicationKey, JobId, JobPosting, ResumeRef, UserAccount, UserId,
};
use super::notifications::{Notification, NotificationError, NotificationPublisher};
use super::repository::{ApplicationRepository, ApplicationScope, Directory, RepositoryError};
use super::storage::{ResumeStore, ResumeUpload, StorageError};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default)]
struct ApplicationTables {
    records: BTreeMap<ApplicationId, Application>,
    by_key: HashMap<ApplicationKey, ApplicationId>,
}

/// Application store with a unique index on `(job, student)`.
#[derive(Default, Clone)]
pub struct InMemoryApplicationRepository {
    tables: Arc<Mutex<ApplicationTables>>,
}

impl InMemoryApplicationRepository {
    pub fn len(&self) -> usize {
        lock(&self.tables)
            .map(|tables| tables.records.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let key = application.key();
        if tables.records.contains_key(&application.id) || tables.by_key.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        tables.by_key.insert(key, application.id.clone());
        tables
            .records
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn update(&self, application: Application) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let stored = tables
            .records
            .get_mut(&application.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.key() != application.key() {
            return Err(RepositoryError::Conflict);
        }
        *stored = application;
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables.records.get(id).cloned())
    }

    fn find_by_key(&self, key: &ApplicationKey) -> Result<Option<Application>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .by_key
            .get(key)
            .and_then(|id| tables.records.get(id))
            .cloned())
    }

    fn list(&self, scope: &ApplicationScope) -> Result<Vec<Application>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .records
            .values()
            .filter(|application| scope.contains(application))
            .cloned()
            .collect())
    }

    fn delete_for_jobs(&self, jobs: &[JobId]) -> Result<usize, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        Ok(remove_where(&mut tables, |application| {
            jobs.contains(application.job())
        }))
    }

    fn delete_for_student(&self, student: &UserId) -> Result<usize, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        Ok(remove_where(&mut tables, |application| {
            application.student() == student
        }))
    }
}

fn remove_where(tables: &mut ApplicationTables, predicate: impl Fn(&Application) -> bool) -> usize {
    let doomed: Vec<ApplicationId> = tables
        .records
        .values()
        .filter(|application| predicate(application))
        .map(|application| application.id.clone())
        .collect();

    for id in &doomed {
        if let Some(application) = tables.records.remove(id) {
            tables.by_key.remove(&application.key());
        }
    }
    doomed.len()
}

/// Seed document accepted by [`InMemoryDirectory::from_json`].
#[derive(Debug, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub users: Vec<UserAccount>,
    #[serde(default)]
    pub jobs: Vec<JobPosting>,
}

/// Failure to build a directory from a JSON seed.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("seed is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("seed could not be stored: {0}")]
    Store(#[from] RepositoryError),
}

#[derive(Default)]
struct DirectoryTables {
    users: HashMap<UserId, UserAccount>,
    jobs: BTreeMap<JobId, JobPosting>,
}

/// Users and jobs held in memory.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    tables: Arc<Mutex<DirectoryTables>>,
}

impl InMemoryDirectory {
    pub fn from_seed(seed: DirectorySeed) -> Result<Self, RepositoryError> {
        let directory = Self::default();
        for user in seed.users {
            directory.upsert_user(user)?;
        }
        for job in seed.jobs {
            directory.upsert_job(job)?;
        }
        Ok(directory)
    }

    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        let seed = serde_json::from_str::<DirectorySeed>(raw)?;
        Ok(Self::from_seed(seed)?)
    }

    pub fn upsert_user(&self, user: UserAccount) -> Result<(), RepositoryError> {
        lock(&self.tables)?.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn upsert_job(&self, job: JobPosting) -> Result<(), RepositoryError> {
        lock(&self.tables)?.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn remove_job(&self, id: &JobId) -> Option<JobPosting> {
        lock(&self.tables).ok()?.jobs.remove(id)
    }

    pub fn remove_user(&self, id: &UserId) -> Option<UserAccount> {
        lock(&self.tables).ok()?.users.remove(id)
    }
}

impl Directory for InMemoryDirectory {
    fn user(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(lock(&self.tables)?.users.get(id).cloned())
    }

    fn job(&self, id: &JobId) -> Result<Option<JobPosting>, RepositoryError> {
        Ok(lock(&self.tables)?.jobs.get(id).cloned())
    }

    fn jobs_created_by(&self, recruiter: &UserId) -> Result<Vec<JobPosting>, RepositoryError> {
        Ok(lock(&self.tables)?
            .jobs
            .values()
            .filter(|job| &job.created_by == recruiter)
            .cloned()
            .collect())
    }

    fn jobs_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>, RepositoryError> {
        Ok(lock(&self.tables)?
            .jobs
            .values()
            .filter(|job| job.created_at < cutoff)
            .map(|job| job.id.clone())
            .collect())
    }
}

/// Resume store that keeps uploaded bytes in memory and hands out
/// `memory://` URLs.
#[derive(Default, Clone)]
pub struct InMemoryResumeStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryResumeStore {
    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(url).cloned()
    }
}

impl ResumeStore for InMemoryResumeStore {
    fn store(
        &self,
        key: &ApplicationKey,
        upload: &ResumeUpload,
    ) -> Result<ResumeRef, StorageError> {
        let url = format!(
            "memory://resumes/{}/{}/{}",
            key.job.0, key.student.0, upload.file_name
        );
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Unavailable("resume store poisoned".to_string()))?;
        blobs.insert(url.clone(), upload.bytes.clone());
        Ok(ResumeRef {
            url,
            file_name: upload.file_name.clone(),
            size_bytes: upload.size_bytes(),
        })
    }
}

/// Publisher that records every notification, acting as an in-app inbox.
#[derive(Default, Clone)]
pub struct InMemoryNotificationInbox {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationInbox {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn for_recipient(&self, recipient: &UserId) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|notification| &notification.recipient == recipient)
            .collect()
    }
}

impl NotificationPublisher for InMemoryNotificationInbox {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| NotificationError::Transport("inbox poisoned".to_string()))?;
        events.push(notification);
        Ok(())
    }
}
