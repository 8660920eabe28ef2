//! Parsing of ffmpeg `-progress` key/value output.

/// Accumulated state of one ffmpeg progress block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Output position in microseconds
    pub out_time_us: i64,
    pub frame: u64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage of `total_duration_secs` encoded so far, capped at 100.
    pub fn percentage(&self, total_duration_secs: f64) -> Option<f64> {
        if total_duration_secs.is_nan() || total_duration_secs <= 0.0 {
            return None;
        }
        if self.is_complete {
            return Some(100.0);
        }
        let done_secs = self.out_time_us.max(0) as f64 / 1_000_000.0;
        Some((done_secs / total_duration_secs * 100.0).min(100.0))
    }
}

/// What a single stderr line turned out to be.
#[derive(Debug, PartialEq)]
pub enum ProgressLine {
    /// A `key=value` pair that updated the current block.
    Field,
    /// `progress=continue|end`: the block is complete.
    Block(FfmpegProgress),
    /// Anything else, usually an ffmpeg diagnostic.
    Other,
}

pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> ProgressLine {
    let line = line.trim();

    let Some((key, value)) = line.split_once('=') else {
        return ProgressLine::Other;
    };

    match key {
        // ffmpeg reports microseconds under both names
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_us = us;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return ProgressLine::Block(current.clone());
        }
        "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames" => {}
        k if k.starts_with("stream_") => {}
        _ => return ProgressLine::Other,
    }

    ProgressLine::Field
}
