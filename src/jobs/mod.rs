//! Sync job tracking
//!
//! [`JobRegistry`] is the only state shared between consumers. Every
//! job record is an `Arc<JobSnapshot>` replaced wholesale under one
//! mutex, so a status query always sees a consistent snapshot.
//! Cancellation is cooperative: [`JobRegistry::cancel`] fires the job's
//! token and the sync loop stops at the next unit boundary. Finished
//! jobs keep their final snapshot for the life of the process.

mod snapshot;
mod sync;

pub use snapshot::{JobKind, JobSnapshot, JobState, MAX_RECORDED_ERRORS};

use crate::backend::MailBackend;
use crate::config::ImapConfig;
use crate::dispatcher::panic_message;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

struct JobEntry {
    snapshot: Arc<JobSnapshot>,
    cancel: CancellationToken,
}

/// Process-wide table of sync jobs; cheap to clone.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new running job.
    #[must_use]
    pub fn create(&self, kind: JobKind) -> JobHandle {
        self.create_with_snapshot(kind).0
    }

    fn create_with_snapshot(&self, kind: JobKind) -> (JobHandle, Arc<JobSnapshot>) {
        let job_id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let snapshot = Arc::new(JobSnapshot::new(job_id.clone(), kind));
        self.lock().insert(
            job_id.clone(),
            JobEntry {
                snapshot: Arc::clone(&snapshot),
                cancel: cancel.clone(),
            },
        );
        info!(job_id = %job_id, ?kind, "Sync job created");
        let handle = JobHandle {
            registry: self.clone(),
            job_id,
            cancel,
        };
        (handle, snapshot)
    }

    #[must_use]
    pub fn get(&self, job_id: &str) -> Option<Arc<JobSnapshot>> {
        self.lock().get(job_id).map(|entry| Arc::clone(&entry.snapshot))
    }

    #[must_use]
    pub fn all(&self) -> BTreeMap<String, Arc<JobSnapshot>> {
        self.lock()
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(&entry.snapshot)))
            .collect()
    }

    /// Request cancellation. `false` if the job is unknown or already
    /// finished.
    #[must_use]
    pub fn cancel(&self, job_id: &str) -> bool {
        let mut jobs = self.lock();
        let Some(entry) = jobs.get_mut(job_id) else {
            return false;
        };
        if entry.snapshot.state.is_terminal() {
            return false;
        }
        if entry.snapshot.state == JobState::Running {
            let mut next = (*entry.snapshot).clone();
            next.state = JobState::Cancelling;
            entry.snapshot = Arc::new(next);
        }
        entry.cancel.cancel();
        info!(job_id, "Sync job cancellation requested");
        true
    }

    /// Apply `change` to a copy of the job's snapshot and publish it.
    /// Terminal snapshots are left untouched.
    fn update(
        &self,
        job_id: &str,
        change: impl FnOnce(&mut JobSnapshot),
    ) -> Option<Arc<JobSnapshot>> {
        let mut jobs = self.lock();
        let entry = jobs.get_mut(job_id)?;
        if !entry.snapshot.state.is_terminal() {
            let mut next = (*entry.snapshot).clone();
            change(&mut next);
            entry.snapshot = Arc::new(next);
        }
        Some(Arc::clone(&entry.snapshot))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// The running side of one job: updates its record and watches its
/// cancellation token.
#[derive(Clone)]
pub struct JobHandle {
    registry: JobRegistry,
    job_id: String,
    cancel: CancellationToken,
}

impl JobHandle {
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current snapshot of this job.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<JobSnapshot>> {
        self.registry.get(&self.job_id)
    }

    fn update(&self, change: impl FnOnce(&mut JobSnapshot)) -> Option<Arc<JobSnapshot>> {
        self.registry.update(&self.job_id, change)
    }

    pub fn set_total(&self, total: u64) {
        self.update(|s| {
            s.total_units = Some(total);
            s.refresh_progress();
        });
    }

    /// One unit finished; `items` messages were seen in it.
    pub fn unit_done(&self, items: u64) {
        self.update(|s| {
            s.processed_count += 1;
            s.items_seen += items;
            s.refresh_progress();
        });
    }

    pub fn unit_failed(&self, message: String) {
        self.update(|s| s.record_error(message));
    }

    /// Move to a terminal state. The first call wins.
    pub fn finish(&self, state: JobState) -> Option<Arc<JobSnapshot>> {
        let snapshot = self.update(|s| s.finish(state));
        if let Some(s) = &snapshot {
            info!(
                job_id = %self.job_id,
                state = ?s.state,
                processed = s.processed_count,
                errors = s.errors.len(),
                "Sync job finished"
            );
        }
        snapshot
    }

    /// Fail the whole job.
    pub fn fail(&self, message: String) -> Option<Arc<JobSnapshot>> {
        self.unit_failed(message);
        self.finish(JobState::Error)
    }

    /// `Cancelled` if cancellation was requested, `Completed` otherwise.
    pub fn conclude(&self) -> Option<Arc<JobSnapshot>> {
        if self.is_cancelled() {
            self.finish(JobState::Cancelled)
        } else {
            self.finish(JobState::Completed)
        }
    }
}

/// Starts sync jobs against a mail backend and answers status queries.
#[derive(Clone)]
pub struct JobManager {
    registry: JobRegistry,
    backend: Arc<dyn MailBackend>,
}

impl JobManager {
    #[must_use]
    pub fn new(registry: JobRegistry, backend: Arc<dyn MailBackend>) -> Self {
        Self { registry, backend }
    }

    #[must_use]
    pub const fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run a full sync to completion and return its final snapshot.
    pub async fn start_full_sync(&self, config: &ImapConfig) -> Arc<JobSnapshot> {
        let (handle, initial) = self.registry.create_with_snapshot(JobKind::Full);
        sync::run_full(&handle, self.backend.as_ref(), config).await;
        handle.snapshot().unwrap_or(initial)
    }

    /// Start a full sync on a background task and return the initial
    /// snapshot.
    pub fn spawn_full_sync(&self, config: ImapConfig) -> Arc<JobSnapshot> {
        let (handle, initial) = self.registry.create_with_snapshot(JobKind::Full);
        let backend = Arc::clone(&self.backend);
        spawn_supervised(handle.clone(), async move {
            sync::run_full(&handle, backend.as_ref(), &config).await;
        });
        initial
    }

    /// Run an incremental sync of `folder` to completion.
    pub async fn start_incremental_sync(
        &self,
        config: &ImapConfig,
        folder: &str,
        since: DateTime<Utc>,
    ) -> Arc<JobSnapshot> {
        let (handle, initial) = self.registry.create_with_snapshot(JobKind::Incremental);
        sync::run_incremental(&handle, self.backend.as_ref(), config, folder, since).await;
        handle.snapshot().unwrap_or(initial)
    }

    /// Start an incremental sync on a background task.
    pub fn spawn_incremental_sync(
        &self,
        config: ImapConfig,
        folder: String,
        since: DateTime<Utc>,
    ) -> Arc<JobSnapshot> {
        let (handle, initial) = self.registry.create_with_snapshot(JobKind::Incremental);
        let backend = Arc::clone(&self.backend);
        spawn_supervised(handle.clone(), async move {
            sync::run_incremental(&handle, backend.as_ref(), &config, &folder, since).await;
        });
        initial
    }

    #[must_use]
    pub fn get_status(&self, job_id: &str) -> Option<Arc<JobSnapshot>> {
        self.registry.get(job_id)
    }

    #[must_use]
    pub fn get_all_statuses(&self) -> BTreeMap<String, Arc<JobSnapshot>> {
        self.registry.all()
    }

    #[must_use]
    pub fn cancel(&self, job_id: &str) -> bool {
        self.registry.cancel(job_id)
    }
}

/// Run a job on its own task. A panic in the job fails it instead of
/// leaving it `Running`.
fn spawn_supervised(handle: JobHandle, job: impl Future<Output = ()> + Send + 'static) {
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
            let message = panic_message(panic.as_ref());
            error!(job_id = %handle.job_id, panic = %message, "Sync task panicked");
            handle.fail(format!("sync task panicked: {message}"));
        }
    });
}
