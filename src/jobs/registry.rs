use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::{RegistryError, Result};
use super::models::{JobId, JobState, JobUpdate};

/// One registry slot: the state channel plus the job's cancellation token
struct JobEntry {
    state: watch::Sender<JobState>,
    cancel: CancellationToken,
}

impl JobEntry {
    fn new() -> Self {
        let (state, _) = watch::channel(JobState::new());
        Self {
            state,
            cancel: CancellationToken::new(),
        }
    }

    fn is_terminal(&self) -> bool {
        self.state.borrow().status.is_terminal()
    }
}

/// Result of [`JobRegistry::claim`]
#[derive(Debug)]
pub enum Claim {
    /// A fresh `starting` entry was installed; the caller owns its execution
    Created(CancellationToken),
    /// A non-terminal entry already exists for this identifier
    Live,
}

/// Shared mapping from job identifier to job state
///
/// Each entry holds a `watch` channel so pollers can take snapshots and late
/// callers can await a terminal state without re-triggering work. Within one
/// job only its owning worker writes; the lock only guards the map itself.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, JobEntry>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, JobEntry>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the initial `starting` state
    ///
    /// A terminal entry for the same identifier is replaced. A live one is
    /// left untouched so its worker stays the only writer.
    pub fn create(&self, id: &JobId) -> Result<CancellationToken> {
        let mut jobs = self.write();

        if jobs.get(id).is_some_and(|existing| !existing.is_terminal()) {
            return Err(RegistryError::AlreadyLive(id.to_string()));
        }

        let entry = JobEntry::new();
        let token = entry.cancel.clone();
        jobs.insert(id.clone(), entry);

        debug!(job_id = %id, "Created job entry");
        Ok(token)
    }

    /// Create an entry unless a live one exists (at most one execution per id)
    pub fn claim(&self, id: &JobId) -> Claim {
        match self.create(id) {
            Ok(token) => Claim::Created(token),
            Err(_) => Claim::Live,
        }
    }

    /// Overwrite the given fields, enforcing the status state machine
    pub fn update(&self, id: &JobId, update: JobUpdate) -> Result<()> {
        let jobs = self.read();
        let entry = jobs
            .get(id)
            .ok_or_else(|| RegistryError::JobNotFound(id.to_string()))?;

        let mut rejected = None;
        entry.state.send_if_modified(|state| match state.check(&update) {
            Ok(()) => {
                state.apply(update);
                true
            }
            Err(edge) => {
                rejected = Some(edge);
                false
            }
        });

        match rejected {
            None => Ok(()),
            Some((from, _)) if from.is_terminal() => {
                Err(RegistryError::AlreadyTerminal(id.to_string()))
            }
            Some((from, to)) => Err(RegistryError::InvalidTransition {
                job_id: id.to_string(),
                from,
                to,
            }),
        }
    }

    /// Snapshot of the job's current state
    pub fn get(&self, id: &JobId) -> Option<JobState> {
        self.read()
            .get(id)
            .map(|entry| entry.state.borrow().clone())
    }

    /// Receiver that observes every subsequent update of the job
    pub fn subscribe(&self, id: &JobId) -> Option<watch::Receiver<JobState>> {
        self.read().get(id).map(|entry| entry.state.subscribe())
    }

    /// Flag the job as abandoned and signal its worker
    ///
    /// Returns `false` when the job had already reached a terminal state.
    pub fn cancel(&self, id: &JobId) -> Result<bool> {
        let jobs = self.read();
        let entry = jobs
            .get(id)
            .ok_or_else(|| RegistryError::JobNotFound(id.to_string()))?;

        if entry.is_terminal() {
            return Ok(false);
        }

        entry.state.send_modify(|state| state.abandoned = true);
        entry.cancel.cancel();

        info!(job_id = %id, "Job abandoned by client");
        Ok(true)
    }

    pub fn is_abandoned(&self, id: &JobId) -> bool {
        self.read()
            .get(id)
            .is_some_and(|entry| entry.state.borrow().abandoned)
    }

    /// Drop terminal entries whose last update is older than `ttl`
    pub fn evict_idle(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut jobs = self.write();
        let before = jobs.len();

        jobs.retain(|_, entry| {
            let state = entry.state.borrow();
            let idle = now
                .signed_duration_since(state.updated_at)
                .to_std()
                .unwrap_or_default();
            !(state.status.is_terminal() && idle > ttl)
        });

        let evicted = before - jobs.len();
        if evicted > 0 {
            info!(evicted, remaining = jobs.len(), "Evicted idle job entries");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
