//! Transcoding engine boundary.
//!
//! An engine turns an input file into a compressed output file and reports
//! percent-complete values on a channel while it works. Returning `Ok(())`
//! means the output file has been fully written.

use crate::modules::compression::model::EncodeParams;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod ffmpeg;
pub mod progress;

pub use ffmpeg::FfmpegEngine;

/// Percent-complete values as reported by the engine, unclamped.
pub type ProgressSender = mpsc::Sender<f64>;

#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub params: EncodeParams,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to start encoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Runs one encode to completion. Dropping the returned future must stop
    /// the underlying work.
    async fn transcode(
        &self,
        request: &TranscodeRequest,
        progress: ProgressSender,
    ) -> Result<(), EngineError>;
}
