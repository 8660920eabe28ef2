//! Job registry: the single source of truth for job state.
//!
//! Callers never hold a live reference into the store. Reads return owned
//! snapshots and writes go through [`JobRegistry::update`], which serializes
//! mutations per job id and refuses any that would break the job state machine.

use crate::modules::compression::model::Job;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod memory;

pub use memory::InMemoryJobRegistry;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job already exists: {0}")]
    AlreadyExists(Uuid),
}

/// Result of an [`JobRegistry::update`] call that found its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The mutation was dropped: the job is terminal or the change would have
    /// violated a job invariant.
    Ignored,
}

pub trait JobRegistry: Send + Sync {
    fn create(&self, job: Job) -> Result<(), RegistryError>;

    fn snapshot(&self, id: &Uuid) -> Result<Job, RegistryError>;

    fn update(
        &self,
        id: &Uuid,
        mutator: &mut dyn FnMut(&mut Job),
    ) -> Result<UpdateOutcome, RegistryError>;

    fn delete(&self, id: &Uuid) -> Result<Job, RegistryError>;

    /// Terminal jobs whose completion time is strictly before `cutoff`.
    fn expired(&self, cutoff: OffsetDateTime) -> Vec<Job>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Checks that `next` is a legal successor of `current`.
pub(crate) fn validate_transition(current: &Job, next: &Job) -> Result<(), &'static str> {
    if next.id != current.id
        || next.original_file_name != current.original_file_name
        || next.original_size != current.original_size
        || next.quality != current.quality
        || next.input_path != current.input_path
        || next.created_at != current.created_at
    {
        return Err("immutable job fields changed");
    }

    if !current.status.can_transition_to(next.status) {
        return Err("illegal status transition");
    }

    if next.progress < current.progress {
        return Err("progress regressed");
    }

    next.check_invariants()
}
