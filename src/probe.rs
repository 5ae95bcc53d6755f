use anyhow::{Context, Result};
use std::path::Path;
use tokio::process::Command;

/// Facts about a local video gathered with ffprobe.
#[derive(Debug, Clone, Default)]
pub struct VideoInfo {
    pub width: i32,
    pub height: i32,
    pub duration_seconds: f64,
}

impl VideoInfo {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// mm:ss form for the file metadata block.
    pub fn duration_formatted(&self) -> String {
        if self.duration_seconds <= 0.0 {
            return "0:00".to_string();
        }
        let total = self.duration_seconds as i64;
        format!("{}:{:02}", total / 60, total % 60)
    }
}

pub async fn check_ffprobe() -> bool {
    match Command::new("ffprobe").arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

async fn ffprobe_video_dimensions(path: &Path) -> Result<(i32, i32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe execution failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let mut parts = text.split('x');
    let w = parts
        .next()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);
    let h = parts
        .next()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);

    if w <= 0 || h <= 0 {
        return Err(anyhow::anyhow!("Invalid dimensions"));
    }

    Ok((w, h))
}

async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        return Err(anyhow::anyhow!("Invalid duration"));
    }
    Ok(duration)
}

/// Probes dimensions and duration in one go. Callers treat failure as a
/// warning and fall back to placeholder metadata.
pub async fn probe_video(path: &Path) -> Result<VideoInfo> {
    let (width, height) = ffprobe_video_dimensions(path).await?;
    let duration_seconds = ffprobe_duration_seconds(path).await?;
    Ok(VideoInfo {
        width,
        height,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_duration_as_minutes_seconds() {
        let info = VideoInfo {
            width: 1920,
            height: 1080,
            duration_seconds: 125.7,
        };
        assert_eq!(info.duration_formatted(), "2:05");
        assert_eq!(info.resolution(), "1920x1080");
    }

    #[test]
    fn zero_duration_formats_as_zero() {
        assert_eq!(VideoInfo::default().duration_formatted(), "0:00");
    }
}
