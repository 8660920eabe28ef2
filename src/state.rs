use crate::config::settings::AppConfig;
use crate::infrastructure::engine::TranscodeEngine;
use crate::infrastructure::registry::{InMemoryJobRegistry, JobRegistry};
use crate::infrastructure::storage::{DownloadGate, LocalStorage};
use crate::workers::scheduler::TaskScheduler;
use crate::workers::sweeper::RetentionSweeper;
use crate::workers::transcoder::{OrchestratorSettings, TranscodeOrchestrator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<dyn JobRegistry>,
    pub storage: LocalStorage,
    pub downloads: DownloadGate,
    pub orchestrator: TranscodeOrchestrator,
    pub scheduler: TaskScheduler,
    started: Arc<AtomicBool>,
}

impl AppState {
    pub async fn new(config: AppConfig, engine: Arc<dyn TranscodeEngine>) -> std::io::Result<Self> {
        Self::with_registry(config, engine, Arc::new(InMemoryJobRegistry::new())).await
    }

    pub async fn with_registry(
        config: AppConfig,
        engine: Arc<dyn TranscodeEngine>,
        registry: Arc<dyn JobRegistry>,
    ) -> std::io::Result<Self> {
        let storage = LocalStorage::new(&config.uploads_dir, &config.processed_dir).await?;
        let scheduler = TaskScheduler::new();

        let orchestrator = TranscodeOrchestrator::new(
            Arc::clone(&registry),
            engine,
            storage.clone(),
            scheduler.clone(),
            OrchestratorSettings::from(&config),
        );

        Ok(Self {
            config,
            registry,
            storage,
            downloads: DownloadGate::new(),
            orchestrator,
            scheduler,
            started: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(
            Arc::clone(&self.registry),
            self.storage.clone(),
            self.downloads.clone(),
            self.config.retention_ttl,
        )
    }

    /// Starts the encode workers and the retention sweeper.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        self.orchestrator.start();
        self.sweeper()
            .start(&self.scheduler, self.config.sweep_interval);
    }

    /// Stops every background task and waits for them to finish. Running
    /// encodes are dropped, which kills their encoder processes.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
