use crate::config::env::{self, EnvKey};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub uploads_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub max_concurrent_encodes: usize,
    pub encode_queue_capacity: usize,
    pub max_encode_duration: Duration,
    pub retention_ttl: Duration,
    pub sweep_interval: Duration,
    pub input_cleanup_delay: Duration,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl AppConfig {
    pub fn new() -> Self {
        let defaults = Self::default();

        Self {
            server_port: env::get_parsed(EnvKey::ServerPort, defaults.server_port),
            uploads_dir: env::get_or(EnvKey::UploadsDir, "uploads").into(),
            processed_dir: env::get_or(EnvKey::ProcessedDir, "processed").into(),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, defaults.max_upload_bytes),
            // A pool of zero workers would accept jobs that never run.
            max_concurrent_encodes: env::get_parsed(
                EnvKey::MaxConcurrentEncodes,
                defaults.max_concurrent_encodes,
            )
            .max(1),
            encode_queue_capacity: env::get_parsed(
                EnvKey::EncodeQueueCapacity,
                defaults.encode_queue_capacity,
            ),
            max_encode_duration: secs(EnvKey::MaxEncodeDurationSecs, defaults.max_encode_duration),
            retention_ttl: secs(EnvKey::RetentionTtlSecs, defaults.retention_ttl),
            sweep_interval: secs(EnvKey::SweepIntervalSecs, defaults.sweep_interval),
            input_cleanup_delay: secs(EnvKey::InputCleanupDelaySecs, defaults.input_cleanup_delay),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg").into(),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe").into(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            uploads_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_concurrent_encodes: 2,
            encode_queue_capacity: 32,
            max_encode_duration: Duration::from_secs(6 * 60 * 60),
            retention_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            input_cleanup_delay: Duration::from_secs(60 * 60),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

fn secs(key: EnvKey, default: Duration) -> Duration {
    Duration::from_secs(env::get_parsed(key, default.as_secs()))
}
