use super::{validate_transition, JobRegistry, RegistryError, UpdateOutcome};
use crate::modules::compression::model::Job;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

/// In-process registry backed by a sharded map, so updates to different jobs
/// only contend when they land in the same shard.
#[derive(Default)]
pub struct InMemoryJobRegistry {
    jobs: DashMap<Uuid, Job>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn create(&self, job: Job) -> Result<(), RegistryError> {
        match self.jobs.entry(job.id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(job.id)),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    fn snapshot(&self, id: &Uuid) -> Result<Job, RegistryError> {
        self.jobs
            .get(id)
            .map(|job| job.clone())
            .ok_or(RegistryError::NotFound(*id))
    }

    fn update(
        &self,
        id: &Uuid,
        mutator: &mut dyn FnMut(&mut Job),
    ) -> Result<UpdateOutcome, RegistryError> {
        let mut current = self.jobs.get_mut(id).ok_or(RegistryError::NotFound(*id))?;

        if current.is_terminal() {
            warn!(job_id = %id, status = %current.status, "Ignoring update to terminal job");
            return Ok(UpdateOutcome::Ignored);
        }

        let mut candidate = current.clone();
        mutator(&mut candidate);

        if let Err(reason) = validate_transition(&current, &candidate) {
            warn!(
                job_id = %id,
                from = %current.status,
                to = %candidate.status,
                reason,
                "Rejected job update"
            );
            return Ok(UpdateOutcome::Ignored);
        }

        *current = candidate;
        Ok(UpdateOutcome::Applied)
    }

    fn delete(&self, id: &Uuid) -> Result<Job, RegistryError> {
        self.jobs
            .remove(id)
            .map(|(_, job)| job)
            .ok_or(RegistryError::NotFound(*id))
    }

    fn expired(&self, cutoff: OffsetDateTime) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|entry| {
                entry.is_terminal()
                    && entry.completed_at.is_some_and(|completed| completed < cutoff)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}
