use super::progress::{parse_progress_line, FfmpegProgress, ProgressLine};
use super::{EngineError, ProgressSender, TranscodeEngine, TranscodeRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Number of trailing diagnostic lines kept for the failure message.
const MAX_DIAGNOSTIC_LINES: usize = 5;

/// Transcodes with the ffmpeg CLI (libx264 + AAC), using ffprobe to learn the
/// input duration so progress can be expressed as a percentage.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn build_args(request: &TranscodeRequest) -> Vec<String> {
        let params = request.params;

        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-i".to_string(),
            request.input_path.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:v".to_string(),
            params.video_bitrate.to_string(),
            "-b:a".to_string(),
            params.audio_bitrate.to_string(),
            "-preset".to_string(),
            params.preset.to_string(),
            "-crf".to_string(),
            params.crf.to_string(),
            // Optimize for web streaming
            "-movflags".to_string(),
            "+faststart".to_string(),
            request.output_path.to_string_lossy().to_string(),
        ]
    }

    /// Input duration in seconds, if ffprobe can tell.
    pub async fn probe_duration(&self, input: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| warn!("ffprobe could not be started: {}", e))
            .ok()?;

        if !output.status.success() {
            warn!(input = %input.display(), "ffprobe failed with {}", output.status);
            return None;
        }

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| warn!("Unreadable ffprobe output: {}", e))
            .ok()?;

        probe
            .format
            .duration
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| *d > 0.0)
    }

    /// Logs whether the configured ffmpeg binary can be executed.
    pub async fn check_available(&self) -> bool {
        let status = Command::new(&self.ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) if s.success() => {
                info!("🎥 FFmpeg is available and ready for compression");
                true
            }
            Ok(s) => {
                warn!("FFmpeg check exited with {}", s);
                false
            }
            Err(e) => {
                warn!(
                    "FFmpeg not found or not working ({}): install FFmpeg to enable compression",
                    e
                );
                false
            }
        }
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn transcode(
        &self,
        request: &TranscodeRequest,
        progress: ProgressSender,
    ) -> Result<(), EngineError> {
        let duration = self.probe_duration(&request.input_path).await;
        if duration.is_none() {
            warn!(
                input = %request.input_path.display(),
                "Unknown input duration, progress will not be reported"
            );
        }

        let args = Self::build_args(request);
        debug!("Running FFmpeg: {} {}", self.ffmpeg.display(), args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Failed("ffmpeg stderr was not captured".to_string()))?;
        let mut reader = BufReader::new(stderr);

        let mut current = FfmpegProgress::default();
        let mut diagnostics: VecDeque<String> = VecDeque::with_capacity(MAX_DIAGNOSTIC_LINES);
        let mut buf = Vec::new();

        while let Some(line) = next_lossy_line(&mut reader, &mut buf).await? {
            match parse_progress_line(&line, &mut current) {
                ProgressLine::Block(block) => {
                    if let Some(pct) = duration.and_then(|d| block.percentage(d)) {
                        // A full channel only means the updater is behind; a
                        // later value supersedes this one.
                        let _ = progress.try_send(pct);
                    }
                }
                ProgressLine::Field => {}
                ProgressLine::Other => {
                    let line = line.trim();
                    if !line.is_empty() {
                        if diagnostics.len() == MAX_DIAGNOSTIC_LINES {
                            diagnostics.pop_front();
                        }
                        diagnostics.push_back(line.to_string());
                    }
                }
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(EngineError::Failed(describe_failure(status, &diagnostics)))
        }
    }
}

/// Reads one line, replacing invalid UTF-8 (file names, localized messages)
/// instead of failing. `None` at end of stream.
async fn next_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn describe_failure(status: ExitStatus, diagnostics: &VecDeque<String>) -> String {
    if diagnostics.is_empty() {
        format!("ffmpeg exited with {}", status)
    } else {
        diagnostics.iter().cloned().collect::<Vec<_>>().join("; ")
    }
}
