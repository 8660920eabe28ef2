use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Open(usize),
    Retired,
}

/// Reference count of in-flight downloads per job.
///
/// A download holds a [`DownloadLease`] for as long as its response body is
/// alive. Before deleting a job's files the sweeper calls [`retire`], which
/// only succeeds when no lease is held and afterwards refuses new leases.
///
/// [`retire`]: DownloadGate::retire
#[derive(Clone, Default)]
pub struct DownloadGate {
    entries: Arc<DashMap<Uuid, GateState>>,
}

impl DownloadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a lease on `job_id`, or `None` if the job is being swept.
    pub fn acquire(&self, job_id: Uuid) -> Option<DownloadLease> {
        let mut entry = self.entries.entry(job_id).or_insert(GateState::Open(0));
        match *entry {
            GateState::Retired => None,
            GateState::Open(n) => {
                *entry = GateState::Open(n + 1);
                Some(DownloadLease {
                    job_id,
                    entries: Arc::clone(&self.entries),
                })
            }
        }
    }

    /// Marks `job_id` as being swept. Fails while any lease is outstanding.
    pub fn retire(&self, job_id: Uuid) -> bool {
        match self.entries.entry(job_id) {
            Entry::Vacant(slot) => {
                slot.insert(GateState::Retired);
                true
            }
            Entry::Occupied(mut slot) => match *slot.get() {
                GateState::Open(0) | GateState::Retired => {
                    slot.insert(GateState::Retired);
                    true
                }
                GateState::Open(_) => false,
            },
        }
    }

    /// Drops the tombstone left by [`retire`](Self::retire) once the job is gone.
    pub fn forget(&self, job_id: Uuid) {
        self.entries
            .remove_if(&job_id, |_, state| *state == GateState::Retired);
    }

    pub fn active(&self, job_id: Uuid) -> usize {
        match self.entries.get(&job_id).map(|s| *s) {
            Some(GateState::Open(n)) => n,
            _ => 0,
        }
    }
}

#[must_use]
pub struct DownloadLease {
    job_id: Uuid,
    entries: Arc<DashMap<Uuid, GateState>>,
}

impl Drop for DownloadLease {
    fn drop(&mut self) {
        if let Entry::Occupied(mut slot) = self.entries.entry(self.job_id) {
            match *slot.get() {
                GateState::Open(n) if n <= 1 => {
                    slot.remove();
                }
                GateState::Open(n) => {
                    slot.insert(GateState::Open(n - 1));
                }
                GateState::Retired => {}
            }
        }
    }
}
