use anyhow::Result;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Video extensions the toolkit recognizes, lowercase.
pub const VIDEO_EXTS: &[&str] = &["mp4", "mov", "avi"];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| VIDEO_EXTS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .to_string()
}

/// Lists video files directly inside `dir`, sorted by name.
pub async fn list_video_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && is_video_file(&path) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Set of base names of the videos in `dir`. Matching captions against this
/// set is extension-agnostic.
pub async fn video_stems(dir: &Path) -> Result<HashSet<String>> {
    let files = list_video_files(dir).await?;
    Ok(files.iter().map(|p| file_stem(p)).collect())
}
