use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the job state machine.
    /// Staying in the same state is always allowed for non-terminal states.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Pending | JobStatus::Processing) => true,
            (
                JobStatus::Processing,
                JobStatus::Processing | JobStatus::Completed | JobStatus::Failed,
            ) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    HighQuality,
    #[default]
    Balanced,
    SmallestSize,
}

/// Encoder settings a quality tier resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub video_bitrate: &'static str,
    pub audio_bitrate: &'static str,
    pub preset: &'static str,
    pub crf: u8,
}

impl QualityTier {
    pub fn params(self) -> EncodeParams {
        match self {
            QualityTier::HighQuality => EncodeParams {
                video_bitrate: "8000k",
                audio_bitrate: "128k",
                preset: "slow",
                crf: 18,
            },
            QualityTier::Balanced => EncodeParams {
                video_bitrate: "4000k",
                audio_bitrate: "96k",
                preset: "medium",
                crf: 23,
            },
            QualityTier::SmallestSize => EncodeParams {
                video_bitrate: "1500k",
                audio_bitrate: "64k",
                preset: "fast",
                crf: 28,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::HighQuality => "high_quality",
            QualityTier::Balanced => "balanced",
            QualityTier::SmallestSize => "smallest_size",
        }
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "high_quality" => Ok(QualityTier::HighQuality),
            "balanced" => Ok(QualityTier::Balanced),
            "smallest_size" => Ok(QualityTier::SmallestSize),
            other => Err(format!(
                "Invalid quality '{}': expected high_quality, balanced or smallest_size",
                other
            )),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub quality: QualityTier,
    pub original_file_name: String,
    pub original_size: u64,
    pub input_path: PathBuf,
    pub compressed_size: Option<u64>,
    pub output_path: Option<PathBuf>,
    pub error_message: Option<String>,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

impl Job {
    pub fn new(
        id: Uuid,
        original_file_name: String,
        original_size: u64,
        quality: QualityTier,
        input_path: PathBuf,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            quality,
            original_file_name,
            original_size,
            input_path,
            compressed_size: None,
            output_path: None,
            error_message: None,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn mark_processing(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Processing;
        }
    }

    /// Applies an engine-reported percentage. Values are clamped to [0, 100]
    /// and never lower the progress already recorded.
    pub fn record_progress(&mut self, reported: f64) {
        if self.status != JobStatus::Processing || reported.is_nan() {
            return;
        }
        let clamped = reported.clamp(0.0, 100.0).round() as u8;
        self.progress = self.progress.max(clamped);
    }

    pub fn complete(&mut self, output_path: PathBuf, compressed_size: u64, at: OffsetDateTime) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.output_path = Some(output_path);
        self.compressed_size = Some(compressed_size);
        self.error_message = None;
        self.completed_at = Some(at);
    }

    pub fn fail(&mut self, message: impl Into<String>, at: OffsetDateTime) {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "Compression failed".to_string();
        }
        self.status = JobStatus::Failed;
        self.output_path = None;
        self.compressed_size = None;
        self.error_message = Some(message);
        self.completed_at = Some(at);
    }

    /// File name of the compressed artifact, present only once completed.
    pub fn output_file_name(&self) -> Option<String> {
        self.output_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn download_file_name(&self) -> String {
        format!("compressed_{}", self.original_file_name)
    }

    /// Checks the result-field invariants for the current status.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if self.progress > 100 {
            return Err("progress out of range");
        }

        let completed = self.status == JobStatus::Completed;
        if completed != self.compressed_size.is_some() || completed != self.output_path.is_some() {
            return Err("result fields must be set exactly when completed");
        }

        let failed = self.status == JobStatus::Failed;
        if failed != self.error_message.is_some() {
            return Err("error message must be set exactly when failed");
        }

        if self.status.is_terminal() != self.completed_at.is_some() {
            return Err("completion time must be set exactly when terminal");
        }

        Ok(())
    }
}

/// Output path for a job: `{dir}/{job_id}_compressed{.ext}` using the
/// original file's extension.
pub fn output_path_for(processed_dir: &Path, job_id: Uuid, original_file_name: &str) -> PathBuf {
    let ext = Path::new(original_file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    processed_dir.join(format!("{}_compressed{}", job_id, ext))
}
