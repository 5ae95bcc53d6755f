use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use vid_caption_tools::api::dashscope::DashScopeClient;
use vid_caption_tools::config::Config;
use vid_caption_tools::generator::run_generation;
use vid_caption_tools::probe;

/// Caption videos with the DashScope vision-language API.
#[derive(Parser, Debug)]
#[command(name = "caption-gen", version, about)]
struct Args {
    /// Directory holding settings.json, prompts.json and schemas/
    #[arg(long, default_value = "configs")]
    configs: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let _ = dotenv::dotenv();
    let args = Args::parse();

    let cfg = Config::load(&args.configs).await?;

    if !probe::check_ffprobe().await {
        eprintln!("[WARNING] ffprobe not found in PATH; file metadata will use placeholders.");
    }

    let backend = DashScopeClient::new(&cfg)?;
    let summary = run_generation(&cfg, &backend).await?;

    println!(
        "Summary: found {} captioned {} failed {}",
        summary.found, summary.captioned, summary.failed
    );
    Ok(())
}
