/// In-memory job registry: the single source of truth for job progress
///
/// Every accepted download request gets an entry keyed by its [`JobId`].
/// The owning worker advances the entry through the status state machine
///
/// ```text
/// starting -> downloading -> completed
///     \            \
///      +------------+-----> error
/// ```
///
/// while request handlers take snapshots or await a terminal state.
/// Entries are volatile; terminal ones are evicted by the retention sweeper
/// once idle for longer than the configured TTL.
///
/// ## Usage
///
/// ```rust,ignore
/// use audiobox::jobs::{JobId, JobRegistry, JobUpdate, JobStatus};
///
/// let registry = JobRegistry::new();
/// let id = JobId::generate();
/// registry.create(&id)?;
/// registry.update(&id, JobUpdate::status(JobStatus::Downloading).with_progress(25))?;
/// let snapshot = registry.get(&id);
/// ```

pub mod error;
pub mod models;
pub mod registry;

pub use error::{RegistryError, Result};
pub use models::{
    InvalidJobId, JobId, JobState, JobStatus, JobUpdate, ProgressReport, ReportStatus,
};
pub use registry::{Claim, JobRegistry};
