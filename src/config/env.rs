use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    UploadsDir,
    ProcessedDir,
    MaxUploadBytes,
    MaxConcurrentEncodes,
    EncodeQueueCapacity,
    MaxEncodeDurationSecs,
    RetentionTtlSecs,
    SweepIntervalSecs,
    InputCleanupDelaySecs,
    FfmpegPath,
    FfprobePath,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "PORT",
            EnvKey::UploadsDir => "UPLOADS_DIR",
            EnvKey::ProcessedDir => "PROCESSED_DIR",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
            EnvKey::MaxConcurrentEncodes => "MAX_CONCURRENT_ENCODES",
            EnvKey::EncodeQueueCapacity => "ENCODE_QUEUE_CAPACITY",
            EnvKey::MaxEncodeDurationSecs => "MAX_ENCODE_DURATION_SECS",
            EnvKey::RetentionTtlSecs => "RETENTION_TTL_SECS",
            EnvKey::SweepIntervalSecs => "SWEEP_INTERVAL_SECS",
            EnvKey::InputCleanupDelaySecs => "INPUT_CLEANUP_DELAY_SECS",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
