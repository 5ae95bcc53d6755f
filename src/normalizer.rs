use crate::caption;
use crate::repair::{self, ParseOutcome};
use crate::videos;
use anyhow::{Context, Result};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_orphans: usize,
    pub processed: usize,
    pub repaired: usize,
    pub unrepaired: usize,
}

/// Caption files directly inside `dir`, sorted by name so every pass visits
/// them in the same order.
fn list_caption_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().and_then(OsStr::to_str) == Some("json"))
        .collect()
}

/// Deletes caption files whose video is gone from the input set. Runs before
/// any parsing, so unparseable orphans are never attempted.
async fn clean_orphans(captions_dir: &Path, input_dir: &Path) -> Result<usize> {
    let stems = videos::video_stems(input_dir)
        .await
        .with_context(|| format!("Failed to list {}", input_dir.display()))?;

    let mut deleted = 0usize;
    for caption_path in list_caption_files(captions_dir) {
        let stem = videos::file_stem(&caption_path);
        if !stems.contains(&stem) {
            match fs::remove_file(&caption_path).await {
                Ok(()) => {
                    info!("Deleted orphan: {}", caption_path.display());
                    deleted += 1;
                }
                Err(err) => {
                    warn!("Error deleting {}: {err}", caption_path.display());
                }
            }
        }
    }
    Ok(deleted)
}

/// Repairs syntax, strips bookkeeping metadata and rewrites each caption
/// with uniform formatting. Unrepairable files are reported, never deleted.
async fn process_files(captions_dir: &Path, report: &mut CleanupReport) -> Result<()> {
    for caption_path in list_caption_files(captions_dir) {
        let content = match fs::read_to_string(&caption_path).await {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to read {}: {err}", caption_path.display());
                report.unrepaired += 1;
                continue;
            }
        };

        let mut value: Value = match repair::parse_or_repair(&content) {
            ParseOutcome::Clean(value) => value,
            ParseOutcome::Repaired(value) => {
                report.repaired += 1;
                value
            }
            ParseOutcome::Unrepaired(err) => {
                warn!(
                    "Failed to fix JSON syntax in {}: {err}",
                    caption_path.display()
                );
                report.unrepaired += 1;
                continue;
            }
        };

        if let Some(map) = value.as_object_mut() {
            caption::strip_metadata(map);
        }

        // Rewrite unconditionally for consistent indentation.
        let serialized = serde_json::to_string_pretty(&value)? + "\n";
        match fs::write(&caption_path, serialized.as_bytes()).await {
            Ok(()) => report.processed += 1,
            Err(err) => {
                warn!("Failed to write {}: {err}", caption_path.display());
                report.unrepaired += 1;
            }
        }
    }
    Ok(())
}

/// Full cleanup pass: orphan removal, then repair + strip + rewrite.
/// Idempotent: a second run deletes nothing and rewrites identical bytes.
pub async fn run_cleanup(captions_dir: &Path, input_dir: &Path) -> Result<CleanupReport> {
    for dir in [captions_dir, input_dir] {
        let is_dir = fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            anyhow::bail!("Directory not found: {}", dir.display());
        }
    }

    let mut report = CleanupReport {
        deleted_orphans: clean_orphans(captions_dir, input_dir).await?,
        ..CleanupReport::default()
    };
    process_files(captions_dir, &mut report).await?;

    info!(
        "Cleanup done. Deleted {} orphans, processed {}, repaired {}, unrepaired {}.",
        report.deleted_orphans, report.processed, report.repaired, report.unrepaired
    );
    Ok(report)
}
