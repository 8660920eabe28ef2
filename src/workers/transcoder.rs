use crate::config::settings::AppConfig;
use crate::infrastructure::engine::{EngineError, TranscodeEngine, TranscodeRequest};
use crate::infrastructure::registry::{JobRegistry, UpdateOutcome};
use crate::infrastructure::storage::LocalStorage;
use crate::modules::compression::model::{JobStatus, QualityTier};
use crate::workers::scheduler::TaskScheduler;
use async_channel::{Receiver, Sender, TrySendError};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const CANCELLED_MESSAGE: &str = "Job cancelled";
const INTERNAL_FAILURE_MESSAGE: &str = "Internal error while compressing the video";
const STAT_FAILURE_MESSAGE: &str = "Failed to get compressed file stats";

/// Progress values buffered per job before the engine starts dropping them.
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_concurrent_encodes: usize,
    pub queue_capacity: usize,
    pub max_encode_duration: Duration,
    pub input_cleanup_delay: Duration,
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrent_encodes: config.max_concurrent_encodes.max(1),
            queue_capacity: config.encode_queue_capacity,
            max_encode_duration: config.max_encode_duration,
            input_cleanup_delay: config.input_cleanup_delay,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Server is busy: {0} compression jobs already in progress, try again later")]
    Saturated(usize),

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {0} is already {1}")]
    AlreadyFinished(Uuid, JobStatus),

    #[error("Compression queue is closed")]
    Closed,
}

/// A reserved place in the encode pool (a worker or a queue slot).
/// Released when dropped.
pub struct EncodePermit {
    outstanding: Arc<AtomicUsize>,
}

impl Drop for EncodePermit {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

struct EncodeTask {
    job_id: Uuid,
    request: TranscodeRequest,
    cancel: CancellationToken,
}

/// Per-job handle kept while a job is queued or running. The permit stays
/// here until a worker claims it, so cancelling a queued job frees its slot.
struct Admission {
    cancel: CancellationToken,
    permit: Option<EncodePermit>,
}

enum EncodeOutcome {
    Finished,
    EngineFailed(EngineError),
    Cancelled,
    TimedOut,
}

/// Runs encodes on a fixed pool of workers fed by a bounded FIFO queue, and
/// maps engine events onto job state through the registry.
#[derive(Clone)]
pub struct TranscodeOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<dyn JobRegistry>,
    engine: Arc<dyn TranscodeEngine>,
    storage: LocalStorage,
    scheduler: TaskScheduler,
    settings: OrchestratorSettings,
    queue_tx: Sender<EncodeTask>,
    queue_rx: Receiver<EncodeTask>,
    outstanding: Arc<AtomicUsize>,
    admissions: DashMap<Uuid, Admission>,
    started: AtomicBool,
}

impl TranscodeOrchestrator {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        engine: Arc<dyn TranscodeEngine>,
        storage: LocalStorage,
        scheduler: TaskScheduler,
        settings: OrchestratorSettings,
    ) -> Self {
        // Admission is bounded by the permit count; the channel may also hold
        // tasks of cancelled jobs that no worker has skipped yet.
        let (queue_tx, queue_rx) = async_channel::unbounded();

        Self {
            inner: Arc::new(Inner {
                registry,
                engine,
                storage,
                scheduler,
                settings,
                queue_tx,
                queue_rx,
                outstanding: Arc::new(AtomicUsize::new(0)),
                admissions: DashMap::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Spawns the encode workers. Calling it again has no effect.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let workers = self.inner.settings.max_concurrent_encodes;
        info!(
            workers,
            queue_capacity = self.inner.settings.queue_capacity,
            "🎥 Starting transcoder workers"
        );

        for worker in 0..workers {
            let inner = Arc::clone(&self.inner);
            self.inner
                .scheduler
                .spawn("transcoder-worker", async move { inner.work(worker).await });
        }
    }

    /// Jobs that can be admitted at once: running plus queued.
    pub fn capacity(&self) -> usize {
        self.inner.settings.max_concurrent_encodes + self.inner.settings.queue_capacity
    }

    pub fn in_flight(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Claims a place in the pool, failing fast when workers and queue are full.
    pub fn reserve(&self) -> Result<EncodePermit, OrchestratorError> {
        let capacity = self.capacity();
        self.inner
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| OrchestratorError::Saturated(capacity))?;

        Ok(EncodePermit {
            outstanding: Arc::clone(&self.inner.outstanding),
        })
    }

    /// Queues an encode for an existing pending job and returns immediately.
    pub fn submit(
        &self,
        job_id: Uuid,
        input_path: PathBuf,
        quality: QualityTier,
        original_file_name: &str,
    ) -> Result<(), OrchestratorError> {
        let permit = self.reserve()?;
        self.submit_reserved(permit, job_id, input_path, quality, original_file_name)
    }

    pub fn submit_reserved(
        &self,
        permit: EncodePermit,
        job_id: Uuid,
        input_path: PathBuf,
        quality: QualityTier,
        original_file_name: &str,
    ) -> Result<(), OrchestratorError> {
        let request = TranscodeRequest {
            input_path,
            output_path: self.inner.storage.output_path(job_id, original_file_name),
            params: quality.params(),
        };

        let cancel = CancellationToken::new();
        self.inner.admissions.insert(
            job_id,
            Admission {
                cancel: cancel.clone(),
                permit: Some(permit),
            },
        );

        let task = EncodeTask {
            job_id,
            request,
            cancel,
        };

        if let Err(e) = self.inner.queue_tx.try_send(task) {
            self.inner.admissions.remove(&job_id);
            return Err(match e {
                TrySendError::Full(_) => OrchestratorError::Saturated(self.capacity()),
                TrySendError::Closed(_) => OrchestratorError::Closed,
            });
        }

        info!(job_id = %job_id, quality = %quality, "📦 Compression job queued");
        Ok(())
    }

    /// Stops a pending or running job. Queued jobs fail immediately and give
    /// back their pool slot; running jobs fail once their encoder is killed.
    pub fn cancel(&self, job_id: Uuid) -> Result<JobStatus, OrchestratorError> {
        let registry = &self.inner.registry;
        let job = registry
            .snapshot(&job_id)
            .map_err(|_| OrchestratorError::NotFound(job_id))?;

        if job.is_terminal() {
            return Err(OrchestratorError::AlreadyFinished(job_id, job.status));
        }

        if let Some(admission) = self.inner.admissions.get(&job_id) {
            admission.cancel.cancel();
        }

        if job.status == JobStatus::Pending {
            let now = OffsetDateTime::now_utc();
            let _ = registry.update(&job_id, &mut |j| j.mark_processing());
            let _ = registry.update(&job_id, &mut |j| j.fail(CANCELLED_MESSAGE, now));

            // Unclaimed permit: no worker has started the job, so its slot
            // and upload are released here. A claimed one is released by
            // the worker.
            let unclaimed = self
                .inner
                .admissions
                .remove(&job_id)
                .and_then(|(_, admission)| admission.permit);
            if let Some(permit) = unclaimed {
                drop(permit);
                self.inner.schedule_input_cleanup(job_id, job.input_path.clone());
            }
        }

        info!(job_id = %job_id, "Cancellation requested");

        Ok(registry
            .snapshot(&job_id)
            .map(|j| j.status)
            .unwrap_or(JobStatus::Failed))
    }
}

impl Inner {
    async fn work(self: Arc<Self>, worker: usize) {
        debug!(worker, "Transcoder worker listening");

        while let Ok(task) = self.queue_rx.recv().await {
            self.run(task).await;
        }
    }

    async fn run(&self, task: EncodeTask) {
        let EncodeTask {
            job_id,
            request,
            cancel,
        } = task;

        let Some(_permit) = self.claim(job_id) else {
            debug!(job_id = %job_id, "Skipping job cancelled while queued");
            return;
        };

        if cancel.is_cancelled() {
            debug!(job_id = %job_id, "Skipping cancelled job");
            self.release(job_id, request.input_path);
            return;
        }

        match self.registry.update(&job_id, &mut |job| job.mark_processing()) {
            Ok(UpdateOutcome::Applied) => {}
            Ok(UpdateOutcome::Ignored) => {
                warn!(job_id = %job_id, "Job could not enter processing, skipping encode");
                self.release(job_id, request.input_path);
                return;
            }
            Err(e) => {
                warn!(job_id = %job_id, "Job vanished before encoding: {}", e);
                self.release(job_id, request.input_path);
                return;
            }
        }

        info!(job_id = %job_id, input = %request.input_path.display(), "Compression started");

        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let updater = tokio::spawn(apply_progress(
            Arc::clone(&self.registry),
            job_id,
            progress_rx,
        ));

        let max_duration = self.settings.max_encode_duration;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => EncodeOutcome::Cancelled,
            result = tokio::time::timeout(max_duration, self.engine.transcode(&request, progress_tx)) => {
                match result {
                    Ok(Ok(())) => EncodeOutcome::Finished,
                    Ok(Err(e)) => EncodeOutcome::EngineFailed(e),
                    Err(_) => EncodeOutcome::TimedOut,
                }
            }
        };

        // The engine future (and its sender) is gone, so the updater drains and exits.
        if let Err(e) = updater.await {
            warn!(job_id = %job_id, "Progress updater stopped abnormally: {}", e);
        }

        self.finish(job_id, &request, outcome).await;
        self.release(job_id, request.input_path);
    }

    async fn finish(&self, job_id: Uuid, request: &TranscodeRequest, outcome: EncodeOutcome) {
        let now = OffsetDateTime::now_utc();

        let failure = match outcome {
            EncodeOutcome::Finished => match tokio::fs::metadata(&request.output_path).await {
                Ok(meta) if meta.is_file() => {
                    let size = meta.len();
                    let output = request.output_path.clone();
                    match self
                        .registry
                        .update(&job_id, &mut |job| job.complete(output.clone(), size, now))
                    {
                        Ok(UpdateOutcome::Applied) => {
                            info!(job_id = %job_id, compressed_size = size, "✅ Job completed successfully");
                        }
                        Ok(UpdateOutcome::Ignored) | Err(_) => {
                            warn!(job_id = %job_id, "Job finalized elsewhere, discarding output");
                            self.storage.discard(&request.output_path).await;
                        }
                    }
                    return;
                }
                Ok(_) => {
                    error!(job_id = %job_id, "Compressed output is not a regular file");
                    STAT_FAILURE_MESSAGE.to_string()
                }
                Err(e) => {
                    error!(job_id = %job_id, "Post-compression error: {}", e);
                    STAT_FAILURE_MESSAGE.to_string()
                }
            },
            EncodeOutcome::EngineFailed(EngineError::Io(e)) => {
                error!(job_id = %job_id, "❌ I/O error during compression: {}", e);
                INTERNAL_FAILURE_MESSAGE.to_string()
            }
            EncodeOutcome::EngineFailed(e) => {
                error!(job_id = %job_id, "❌ Compression failed: {}", e);
                e.to_string()
            }
            EncodeOutcome::Cancelled => {
                info!(job_id = %job_id, "Compression cancelled");
                CANCELLED_MESSAGE.to_string()
            }
            EncodeOutcome::TimedOut => {
                let limit = describe_limit(self.settings.max_encode_duration);
                warn!(job_id = %job_id, "Compression exceeded {}, encoder killed", limit);
                format!("Encode exceeded maximum duration of {}", limit)
            }
        };

        // Partial output must never become downloadable.
        self.storage.discard(&request.output_path).await;

        if let Err(e) = self
            .registry
            .update(&job_id, &mut |job| job.fail(failure.as_str(), now))
        {
            warn!(job_id = %job_id, "Could not record failure: {}", e);
        }
    }

    /// Takes the job's permit out of its admission entry. `None` means the
    /// job was cancelled before a worker reached it.
    fn claim(&self, job_id: Uuid) -> Option<EncodePermit> {
        self.admissions
            .get_mut(&job_id)
            .and_then(|mut admission| admission.permit.take())
    }

    /// Forgets the job's admission and schedules removal of its upload.
    fn release(&self, job_id: Uuid, input_path: PathBuf) {
        self.admissions.remove(&job_id);
        self.schedule_input_cleanup(job_id, input_path);
    }

    fn schedule_input_cleanup(&self, job_id: Uuid, input_path: PathBuf) {
        let storage = self.storage.clone();
        self.scheduler.spawn_after(
            "input-cleanup",
            self.settings.input_cleanup_delay,
            async move {
                match storage.remove_if_exists(&input_path).await {
                    Ok(true) => debug!(job_id = %job_id, "Removed uploaded input"),
                    Ok(false) => {}
                    Err(e) => warn!(job_id = %job_id, "Failed to remove uploaded input: {}", e),
                }
            },
        );
    }
}

/// Whole seconds, or milliseconds for sub-second limits.
fn describe_limit(limit: Duration) -> String {
    if limit < Duration::from_secs(1) {
        format!("{}ms", limit.as_millis())
    } else {
        format!("{}s", limit.as_secs())
    }
}

/// Single consumer of a job's progress channel; values apply in arrival order.
async fn apply_progress(
    registry: Arc<dyn JobRegistry>,
    job_id: Uuid,
    mut rx: mpsc::Receiver<f64>,
) {
    while let Some(reported) = rx.recv().await {
        if let Err(e) = registry.update(&job_id, &mut |job| job.record_progress(reported)) {
            warn!(job_id = %job_id, "Dropping progress for missing job: {}", e);
            break;
        }
        debug!(job_id = %job_id, reported, "Progress update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::engine::ProgressSender;
    use crate::infrastructure::registry::InMemoryJobRegistry;
    use crate::modules::compression::model::Job;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    enum Ending {
        Succeed(Vec<u8>),
        Fail(&'static str),
        Hang,
    }

    struct StubEngine {
        steps: Vec<f64>,
        gate: Option<Arc<Notify>>,
        ending: Ending,
    }

    impl StubEngine {
        fn new(steps: Vec<f64>, ending: Ending) -> Self {
            Self {
                steps,
                gate: None,
                ending,
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl TranscodeEngine for StubEngine {
        async fn transcode(
            &self,
            request: &TranscodeRequest,
            progress: ProgressSender,
        ) -> Result<(), EngineError> {
            for pct in &self.steps {
                let _ = progress.send(*pct).await;
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.ending {
                Ending::Succeed(bytes) => {
                    tokio::fs::write(&request.output_path, bytes).await?;
                    Ok(())
                }
                Ending::Fail(message) => {
                    tokio::fs::write(&request.output_path, b"partial").await?;
                    Err(EngineError::Failed(message.to_string()))
                }
                Ending::Hang => {
                    tokio::fs::write(&request.output_path, b"partial").await?;
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        }
    }

    struct Harness {
        orchestrator: TranscodeOrchestrator,
        registry: Arc<InMemoryJobRegistry>,
        storage: LocalStorage,
        scheduler: TaskScheduler,
        _tmp: TempDir,
    }

    fn settings(workers: usize, queue: usize) -> OrchestratorSettings {
        OrchestratorSettings {
            max_concurrent_encodes: workers,
            queue_capacity: queue,
            max_encode_duration: Duration::from_secs(30),
            input_cleanup_delay: Duration::from_secs(3600),
        }
    }

    async fn harness(engine: StubEngine, settings: OrchestratorSettings) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(tmp.path().join("uploads"), tmp.path().join("processed"))
            .await
            .unwrap();
        let registry = Arc::new(InMemoryJobRegistry::new());
        let scheduler = TaskScheduler::new();
        let orchestrator = TranscodeOrchestrator::new(
            registry.clone(),
            Arc::new(engine),
            storage.clone(),
            scheduler.clone(),
            settings,
        );
        orchestrator.start();

        Harness {
            orchestrator,
            registry,
            storage,
            scheduler,
            _tmp: tmp,
        }
    }

    async fn enqueue(h: &Harness, name: &str) -> Result<Uuid, OrchestratorError> {
        let id = Uuid::new_v4();
        let input = h.storage.upload_path(id, "mp4");
        tokio::fs::write(&input, vec![7u8; 4096]).await.unwrap();
        h.registry
            .create(Job::new(id, name.to_string(), 4096, QualityTier::Balanced, input.clone()))
            .unwrap();
        h.orchestrator
            .submit(id, input, QualityTier::Balanced, name)
            .map(|_| id)
    }

    async fn wait_for_terminal(registry: &InMemoryJobRegistry, id: Uuid) -> Job {
        for _ in 0..200 {
            let job = registry.snapshot(&id).unwrap();
            if job.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not reach a terminal state");
    }

    async fn wait_for_status(registry: &InMemoryJobRegistry, id: Uuid, status: JobStatus) {
        for _ in 0..200 {
            if registry.snapshot(&id).unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached {status}");
    }

    #[tokio::test]
    async fn successful_encode_completes_job() {
        let h = harness(
            StubEngine::new(vec![10.0, 55.0, 90.0], Ending::Succeed(vec![1u8; 1000])),
            settings(1, 4),
        )
        .await;

        let id = enqueue(&h, "trip.mp4").await.unwrap();
        let job = wait_for_terminal(&h.registry, id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.compressed_size, Some(1000));
        let output = job.output_path.clone().unwrap();
        assert_eq!(
            output.file_name().unwrap().to_string_lossy(),
            format!("{}_compressed.mp4", id)
        );
        assert!(output.exists());
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn progress_never_regresses_while_processing() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            StubEngine::new(vec![20.0, 70.0, 35.0, -4.0, 64.0], Ending::Succeed(vec![1u8; 10]))
                .gated(gate.clone()),
            settings(1, 1),
        )
        .await;

        let id = enqueue(&h, "a.mp4").await.unwrap();

        let mut observed = Vec::new();
        for _ in 0..50 {
            let job = h.registry.snapshot(&id).unwrap();
            observed.push(job.progress);
            if job.progress == 70 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        observed.push(h.registry.snapshot(&id).unwrap().progress);

        assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{observed:?}");
        assert_eq!(*observed.last().unwrap(), 70);

        gate.notify_one();
        let job = wait_for_terminal(&h.registry, id).await;
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn engine_failure_fails_job_and_removes_partial_output() {
        let h = harness(
            StubEngine::new(vec![30.0], Ending::Fail("Conversion failed!")),
            settings(1, 1),
        )
        .await;

        let id = enqueue(&h, "broken.mkv").await.unwrap();
        let job = wait_for_terminal(&h.registry, id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("Conversion failed!"));
        assert!(job.output_path.is_none());
        assert!(job.compressed_size.is_none());

        let partial = h.storage.output_path(id, "broken.mkv");
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn watchdog_fails_hung_encode() {
        let mut s = settings(1, 1);
        s.max_encode_duration = Duration::from_millis(50);
        let h = harness(StubEngine::new(vec![5.0], Ending::Hang), s).await;

        let id = enqueue(&h, "slow.mp4").await.unwrap();
        let job = wait_for_terminal(&h.registry, id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("Encode exceeded maximum duration of 50ms")
        );
        assert!(!h.storage.output_path(id, "slow.mp4").exists());
    }

    #[tokio::test]
    async fn cancel_stops_running_and_queued_jobs() {
        let h = harness(StubEngine::new(vec![], Ending::Hang), settings(1, 2)).await;

        let running = enqueue(&h, "one.mp4").await.unwrap();
        wait_for_status(&h.registry, running, JobStatus::Processing).await;
        let queued = enqueue(&h, "two.mp4").await.unwrap();
        assert_eq!(h.registry.snapshot(&queued).unwrap().status, JobStatus::Pending);

        let status = h.orchestrator.cancel(queued).unwrap();
        assert_eq!(status, JobStatus::Failed);

        h.orchestrator.cancel(running).unwrap();
        let job = wait_for_terminal(&h.registry, running).await;
        assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));

        let job = h.registry.snapshot(&queued).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));

        assert_eq!(
            h.orchestrator.cancel(running),
            Err(OrchestratorError::AlreadyFinished(running, JobStatus::Failed))
        );
        let unknown = Uuid::new_v4();
        assert_eq!(
            h.orchestrator.cancel(unknown),
            Err(OrchestratorError::NotFound(unknown))
        );
    }

    #[tokio::test]
    async fn cancelling_queued_job_frees_its_slot_and_input() {
        let mut s = settings(1, 1);
        s.input_cleanup_delay = Duration::ZERO;
        let h = harness(StubEngine::new(vec![], Ending::Hang), s).await;

        let running = enqueue(&h, "a.mp4").await.unwrap();
        wait_for_status(&h.registry, running, JobStatus::Processing).await;
        let queued = enqueue(&h, "b.mp4").await.unwrap();
        assert!(h.orchestrator.reserve().is_err());

        assert_eq!(h.orchestrator.cancel(queued).unwrap(), JobStatus::Failed);
        assert_eq!(h.orchestrator.in_flight(), 1);

        let permit = h.orchestrator.reserve();
        assert!(permit.is_ok());
        drop(permit);

        let input = h.registry.snapshot(&queued).unwrap().input_path;
        for _ in 0..100 {
            if !input.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!input.exists());

        // A freed slot takes new work while the first encode is still stuck.
        let next = enqueue(&h, "c.mp4").await.unwrap();
        assert_eq!(h.registry.snapshot(&next).unwrap().status, JobStatus::Pending);
        assert_eq!(
            h.registry.snapshot(&running).unwrap().status,
            JobStatus::Processing
        );

        h.orchestrator.cancel(running).unwrap();
        wait_for_status(&h.registry, next, JobStatus::Processing).await;
        h.orchestrator.cancel(next).unwrap();
        wait_for_terminal(&h.registry, next).await;
    }

    #[test]
    fn limits_are_described_in_readable_units() {
        assert_eq!(describe_limit(Duration::from_millis(250)), "250ms");
        assert_eq!(describe_limit(Duration::from_secs(21_600)), "21600s");
        assert_eq!(describe_limit(Duration::from_millis(1_500)), "1s");
    }

    #[tokio::test]
    async fn saturated_pool_rejects_new_work() {
        let h = harness(StubEngine::new(vec![], Ending::Hang), settings(1, 1)).await;

        let first = enqueue(&h, "1.mp4").await.unwrap();
        let second = enqueue(&h, "2.mp4").await.unwrap();
        assert_eq!(h.orchestrator.in_flight(), 2);

        assert!(matches!(h.orchestrator.reserve(), Err(OrchestratorError::Saturated(2))));

        h.orchestrator.cancel(first).unwrap();
        h.orchestrator.cancel(second).unwrap();
        wait_for_terminal(&h.registry, first).await;

        for _ in 0..100 {
            if h.orchestrator.in_flight() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(h.orchestrator.reserve().is_ok());
    }

    #[tokio::test]
    async fn input_is_removed_after_cleanup_delay() {
        let mut s = settings(1, 1);
        s.input_cleanup_delay = Duration::from_millis(20);
        let h = harness(StubEngine::new(vec![], Ending::Succeed(vec![0u8; 8])), s).await;

        let id = enqueue(&h, "short.mp4").await.unwrap();
        let job = wait_for_terminal(&h.registry, id).await;

        for _ in 0..100 {
            if !job.input_path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!job.input_path.exists());
        assert!(job.output_path.unwrap().exists());

        h.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_jobs_finish_independently() {
        let h = harness(
            StubEngine::new(vec![25.0, 50.0, 75.0], Ending::Succeed(vec![9u8; 64])),
            settings(3, 10),
        )
        .await;

        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(enqueue(&h, &format!("clip{i}.webm")).await.unwrap());
        }

        for id in ids {
            let job = wait_for_terminal(&h.registry, id).await;
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.compressed_size, Some(64));
            assert!(job.output_path.unwrap().ends_with(format!("{}_compressed.webm", id)));
        }
    }
}
