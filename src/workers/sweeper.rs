use crate::infrastructure::registry::JobRegistry;
use crate::infrastructure::storage::{DownloadGate, LocalStorage};
use crate::workers::scheduler::TaskScheduler;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    /// Expired jobs left for the next run because a download was in flight.
    pub deferred: usize,
}

/// Removes finished jobs, and their files, once they are older than the
/// retention window.
#[derive(Clone)]
pub struct RetentionSweeper {
    registry: Arc<dyn JobRegistry>,
    storage: LocalStorage,
    downloads: DownloadGate,
    ttl: Duration,
}

impl RetentionSweeper {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        storage: LocalStorage,
        downloads: DownloadGate,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            storage,
            downloads,
            ttl,
        }
    }

    pub async fn sweep(&self, now: OffsetDateTime) -> SweepReport {
        let mut report = SweepReport::default();

        let Some(cutoff) = time::Duration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_sub(ttl))
        else {
            return report;
        };

        for job in self.registry.expired(cutoff) {
            if !self.downloads.retire(job.id) {
                debug!(job_id = %job.id, "Download in progress, deferring cleanup");
                report.deferred += 1;
                continue;
            }

            // Record first, so no new status or download can reach the files.
            if self.registry.delete(&job.id).is_ok() {
                self.storage.discard(&job.input_path).await;
                if let Some(output) = &job.output_path {
                    self.storage.discard(output).await;
                }
                report.removed += 1;
                info!(job_id = %job.id, status = %job.status, "🧹 Cleaned up old job");
            }

            self.downloads.forget(job.id);
        }

        report
    }

    /// Runs [`sweep`](Self::sweep) every `period` until the scheduler shuts down.
    pub fn start(self, scheduler: &TaskScheduler, period: Duration) {
        info!(
            period_secs = period.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Starting retention sweeper"
        );

        let sweeper = Arc::new(self);
        scheduler.spawn_periodic("retention-sweeper", period, move || {
            let sweeper = Arc::clone(&sweeper);
            async move {
                let report = sweeper.sweep(OffsetDateTime::now_utc()).await;
                if report.deferred > 0 {
                    warn!(deferred = report.deferred, "Some expired jobs are still being downloaded");
                }
                debug!(removed = report.removed, "Retention sweep finished");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::registry::InMemoryJobRegistry;
    use crate::modules::compression::model::{Job, QualityTier};
    use uuid::Uuid;

    async fn finished_job(
        registry: &InMemoryJobRegistry,
        storage: &LocalStorage,
        completed_at: OffsetDateTime,
    ) -> Job {
        let id = Uuid::new_v4();
        let input = storage.upload_path(id, "mp4");
        let output = storage.output_path(id, "clip.mp4");
        tokio::fs::write(&input, b"input").await.unwrap();
        tokio::fs::write(&output, b"output").await.unwrap();

        registry
            .create(Job::new(id, "clip.mp4".to_string(), 5, QualityTier::Balanced, input))
            .unwrap();
        registry.update(&id, &mut |j| j.mark_processing()).unwrap();
        registry
            .update(&id, &mut |j| j.complete(output.clone(), 6, completed_at))
            .unwrap();
        registry.snapshot(&id).unwrap()
    }

    async fn setup() -> (tempfile::TempDir, Arc<InMemoryJobRegistry>, LocalStorage, DownloadGate) {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(tmp.path().join("uploads"), tmp.path().join("processed"))
            .await
            .unwrap();
        (tmp, Arc::new(InMemoryJobRegistry::new()), storage, DownloadGate::new())
    }

    #[tokio::test]
    async fn removes_only_jobs_past_retention() {
        let (_tmp, registry, storage, gate) = setup().await;
        let now = OffsetDateTime::now_utc();

        let old = finished_job(&registry, &storage, now - time::Duration::hours(25)).await;
        let fresh = finished_job(&registry, &storage, now - time::Duration::hours(1)).await;

        let sweeper = RetentionSweeper::new(
            registry.clone(),
            storage.clone(),
            gate,
            Duration::from_secs(24 * 60 * 60),
        );
        let report = sweeper.sweep(now).await;

        assert_eq!(report, SweepReport { removed: 1, deferred: 0 });
        assert!(registry.snapshot(&old.id).is_err());
        assert!(!old.output_path.unwrap().exists());
        assert!(!old.input_path.exists());

        assert!(registry.snapshot(&fresh.id).is_ok());
        assert!(fresh.output_path.unwrap().exists());
    }

    #[tokio::test]
    async fn leased_job_is_deferred_until_download_ends() {
        let (_tmp, registry, storage, gate) = setup().await;
        let now = OffsetDateTime::now_utc();
        let job = finished_job(&registry, &storage, now - time::Duration::days(2)).await;

        let sweeper = RetentionSweeper::new(
            registry.clone(),
            storage.clone(),
            gate.clone(),
            Duration::from_secs(60),
        );

        let lease = gate.acquire(job.id).unwrap();
        let report = sweeper.sweep(now).await;
        assert_eq!(report, SweepReport { removed: 0, deferred: 1 });
        assert!(job.output_path.as_ref().unwrap().exists());

        drop(lease);
        let report = sweeper.sweep(now).await;
        assert_eq!(report.removed, 1);
        assert!(!job.output_path.unwrap().exists());
        assert!(gate.acquire(job.id).is_some());
    }
}
