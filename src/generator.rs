use crate::api::{CaptionBackend, CaptionRequest};
use crate::caption::{self, FileMetadata, UsageMetadata};
use crate::config::Config;
use crate::pricing;
use crate::probe::{self, VideoInfo};
use crate::videos;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct RunSummary {
    pub found: usize,
    pub captioned: usize,
    pub failed: usize,
}

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn ensure_dir(path: &Path) -> Result<()> {
    if !dir_exists(path).await {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

/// Sliding 60-second window over request instants. Requests beyond the RPM
/// budget wait until the oldest one ages out.
struct RateWindow {
    timestamps: VecDeque<Instant>,
    max_rpm: usize,
}

impl RateWindow {
    fn new(max_rpm: u32) -> Self {
        Self {
            timestamps: VecDeque::new(),
            max_rpm: max_rpm.max(1) as usize,
        }
    }

    async fn admit(&mut self) {
        let now = Instant::now();
        while self
            .timestamps
            .front()
            .is_some_and(|t| now.duration_since(*t) > Duration::from_secs(60))
        {
            self.timestamps.pop_front();
        }

        if self.timestamps.len() >= self.max_rpm {
            if let Some(oldest) = self.timestamps.front() {
                let wait = Duration::from_secs(60).saturating_sub(now.duration_since(*oldest));
                if !wait.is_zero() {
                    warn!("Rate limit reached. Waiting {:.2} seconds...", wait.as_secs_f64());
                    tokio::time::sleep(wait).await;
                }
            }
            self.timestamps.pop_front();
        }

        self.timestamps.push_back(Instant::now());
    }
}

/// Stems that already have a caption file in the output directory.
async fn captioned_stems(captions_dir: &Path) -> Result<HashSet<String>> {
    let mut out = HashSet::new();
    if !dir_exists(captions_dir).await {
        return Ok(out);
    }
    let mut entries = fs::read_dir(captions_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file()
            && path.extension().and_then(OsStr::to_str) == Some("json")
        {
            out.insert(videos::file_stem(&path));
        }
    }
    Ok(out)
}

/// Builds the work list: uncaptioned videos, optionally shuffled, capped at
/// max_items.
async fn gather_work(cfg: &Config, captions_dir: &Path) -> Result<Vec<PathBuf>> {
    let input_dir = cfg.input_dir();
    if !dir_exists(&input_dir).await {
        anyhow::bail!("Input directory not found: {}", input_dir.display());
    }

    let all_videos = videos::list_video_files(&input_dir)
        .await
        .with_context(|| format!("Failed to list {}", input_dir.display()))?;
    let done = captioned_stems(captions_dir).await?;

    let mut work: Vec<PathBuf> = all_videos
        .into_iter()
        .filter(|p| !done.contains(&videos::file_stem(p)))
        .collect();

    if cfg.settings.vid_caption.shuffle {
        let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
        work.shuffle(&mut rng);
    }

    work.truncate(cfg.settings.vid_caption.max_items);
    Ok(work)
}

async fn probe_or_default(path: &Path) -> VideoInfo {
    match probe::probe_video(path).await {
        Ok(info) => info,
        Err(err) => {
            warn!("ffprobe failed for {}: {err}", path.display());
            VideoInfo::default()
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

async fn file_size_mb(path: &Path) -> f64 {
    let bytes = fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
    round2(bytes as f64 / (1024.0 * 1024.0))
}

/// Issues the captioning request, retrying transient failures with
/// exponential backoff.
async fn caption_with_retries(
    backend: &dyn CaptionBackend,
    request: &CaptionRequest,
    max_retries: u32,
) -> Result<crate::api::CaptionResponse, crate::api::ApiError> {
    let mut attempt = 0u32;
    loop {
        match backend.caption_video(request).await {
            Ok(resp) => return Ok(resp),
            Err(err) if err.is_transient() && attempt < max_retries => {
                let backoff = Duration::from_secs(1 << attempt.min(5));
                warn!(
                    "Transient API failure ({err}); retrying in {}s ({}/{})",
                    backoff.as_secs(),
                    attempt + 1,
                    max_retries
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn process_video(
    cfg: &Config,
    backend: &dyn CaptionBackend,
    video_path: &Path,
    out_path: &Path,
) -> Result<bool> {
    let model = &cfg.settings.vid_caption.model;
    let fps = cfg.settings.vid_caption.frame_sampling_fps;
    let info = probe_or_default(video_path).await;

    // The schema rides along inside the system prompt to steer the model
    // toward schema-shaped JSON.
    let schema_str = serde_json::to_string_pretty(&cfg.schema).unwrap_or_default();
    let system_prompt = format!(
        "{}\n\nIMPORTANT: You must strictly follow this JSON schema:\n{}",
        cfg.prompts.video.system, schema_str
    );

    let request = CaptionRequest {
        video_path: video_path.to_path_buf(),
        system_prompt,
        user_prompt: cfg.prompts.video.user.clone(),
        frame_sampling_fps: fps,
    };

    info!("Sending video request to {model} with FPS={fps}...");
    let response =
        match caption_with_retries(backend, &request, cfg.settings.safety.max_retries).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!("Captioning failed for {}: {err}", video_path.display());
                return Ok(false);
            }
        };

    let cost = pricing::calculate_cost(
        response.usage.input_tokens,
        response.usage.output_tokens,
        model,
    );
    info!(
        "API usage for {}: {} in / {} out tokens, est. ${:.6}",
        video_path.display(),
        response.usage.input_tokens,
        response.usage.output_tokens,
        cost.total_cost_usd
    );

    let usage_metadata = UsageMetadata {
        prompt_tokens: response.usage.input_tokens,
        completion_tokens: response.usage.output_tokens,
        total_tokens: response.usage.total(),
        estimated_cost_usd: cost.total_cost_usd,
    };
    let file_metadata = FileMetadata {
        filename: video_path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_string(),
        file_size_mb: file_size_mb(video_path).await,
        analysis_timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        model_used: model.clone(),
        frame_sampling_enabled: true,
        frame_sampling_fps: fps,
        sampling_method: "api_native_sampling".to_string(),
        resolution: info.resolution(),
        video_length_seconds: round2(info.duration_seconds),
        video_length_formatted: info.duration_formatted(),
    };

    let caption_doc = caption::parse_caption_text(&response.text);
    let document = caption::with_metadata(caption_doc, &usage_metadata, &file_metadata);

    // Serialize fully before touching the filesystem; a failed item leaves
    // no partial file behind.
    let serialized = serde_json::to_string_pretty(&document)? + "\n";
    if let Err(err) = fs::write(out_path, serialized.as_bytes()).await {
        warn!("Failed to write {}: {err}", out_path.display());
        return Ok(false);
    }

    Ok(true)
}

pub async fn run_generation(cfg: &Config, backend: &dyn CaptionBackend) -> Result<RunSummary> {
    let captions_dir = cfg.captions_dir();
    ensure_dir(&captions_dir).await?;

    let work = gather_work(cfg, &captions_dir).await?;
    let mut summary = RunSummary {
        found: work.len(),
        ..Default::default()
    };

    if work.is_empty() {
        info!("No new videos to process.");
        return Ok(summary);
    }
    info!("Found {} new videos to process.", work.len());

    let model = &cfg.settings.vid_caption.model;
    let mut rate = RateWindow::new(cfg.settings.safety.rpm_for(model));
    let delay = Duration::from_secs_f64(cfg.settings.safety.request_delay_seconds.max(0.0));

    for video_path in &work {
        let stem = videos::file_stem(video_path);
        let out_path = captions_dir.join(format!("{stem}.json"));

        info!("=== Processing: {stem} ===");
        rate.admit().await;

        match process_video(cfg, backend, video_path, &out_path).await {
            Ok(true) => {
                summary.captioned += 1;
                info!("Successfully processed {stem}");
            }
            Ok(false) => {
                summary.failed += 1;
            }
            Err(err) => {
                summary.failed += 1;
                warn!("Error processing {stem}: {err}");
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    info!(
        "All done. Found: {} captioned: {} failed: {}",
        summary.found, summary.captioned, summary.failed
    );
    Ok(summary)
}
