//! services/api/src/adapters/gif.rs
//!
//! Animated-image export: feeds a recorded video clip through the system
//! `ffmpeg` binary and returns the resulting GIF. Progress is reported as
//! coarse text at fixed milestones, never as a percentage.

use chrono::{DateTime, Utc};
use std::process::Stdio;
use tokio::process::Command;
use visual_journal_core::ports::{PortError, PortResult};

/// Output frame rate of the animated image.
const GIF_FPS: u32 = 15;
/// Output width in pixels; height follows proportionally.
const GIF_WIDTH: u32 = 320;

/// The fixed progress milestones, in the order they are reported.
pub mod progress {
    pub const LOADING: &str = "Loading conversion engine...";
    pub const CONVERTING: &str = "Converting video data...";
    pub const EXECUTING: &str = "Executing GIF conversion command...";
    pub const READING: &str = "Reading resulting GIF file...";
}

/// Transcodes recorded clips into animated images.
#[derive(Clone)]
pub struct GifExporter {
    ffmpeg_path: String,
}

impl GifExporter {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    // We intentionally shell out to the system `ffmpeg` binary rather than
    // linking a transcoding library, which would require native FFmpeg dev
    // headers at build time.
    fn is_available(&self) -> bool {
        std::process::Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn filter_arg() -> String {
        format!("fps={GIF_FPS},scale={GIF_WIDTH}:-1:flags=lanczos")
    }

    /// Converts a recorded clip into a GIF, reporting each milestone through
    /// `on_progress`. The conversion is not cancellable once started.
    pub async fn convert(
        &self,
        video: &[u8],
        mut on_progress: impl FnMut(&str) + Send,
    ) -> PortResult<Vec<u8>> {
        on_progress(progress::LOADING);
        if !self.is_available() {
            return Err(PortError::Unexpected(format!(
                "'{}' is required for GIF export, but was not found on PATH",
                self.ffmpeg_path
            )));
        }

        on_progress(progress::CONVERTING);
        let workdir = tempfile::tempdir()
            .map_err(|e| PortError::Unexpected(format!("Failed to create scratch dir: {}", e)))?;
        let input = workdir.path().join("input.webm");
        let output = workdir.path().join("output.gif");
        tokio::fs::write(&input, video)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write input clip: {}", e)))?;

        on_progress(progress::EXECUTING);
        let result = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .args(["-loglevel", "error", "-i"])
            .arg(&input)
            .args(["-vf", &Self::filter_arg(), "-f", "gif"])
            .arg(&output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to run ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PortError::Unexpected(format!(
                "ffmpeg exited with status {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        on_progress(progress::READING);
        tokio::fs::read(&output)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read converted GIF: {}", e)))
    }

    /// Download filename for an exported clip, timestamped to the millisecond.
    pub fn download_filename(now: DateTime<Utc>) -> String {
        format!("journal-video-{}.gif", now.timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filter_pins_frame_rate_and_width() {
        let filter = GifExporter::filter_arg();
        assert!(filter.contains("fps=15"));
        assert!(filter.contains("scale=320:-1"));
    }

    #[test]
    fn download_filename_is_timestamped() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(
            GifExporter::download_filename(t),
            format!("journal-video-{}.gif", t.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn missing_binary_fails_after_the_first_milestone() {
        let exporter = GifExporter::new("definitely-not-ffmpeg");
        let mut milestones = Vec::new();
        let result = exporter
            .convert(b"clip", |m| milestones.push(m.to_string()))
            .await;

        assert!(result.is_err());
        assert_eq!(milestones, vec![progress::LOADING.to_string()]);
    }
}
