use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use vid_caption_tools::normalizer::run_cleanup;

/// Clean up orphaned caption files and normalize caption JSON.
#[derive(Parser, Debug)]
#[command(name = "caption-clean", version, about)]
struct Args {
    /// Directory containing caption JSON files
    #[arg(long, default_value = "Human_Captions")]
    captions: PathBuf,

    /// Directory containing input video files
    #[arg(long, default_value = "input")]
    input: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let report = run_cleanup(&args.captions, &args.input).await?;

    println!("Deleted {} orphaned files.", report.deleted_orphans);
    println!("Processed {} files.", report.processed);
    println!("Repaired syntax in {} files.", report.repaired);
    println!("Unrepaired files: {}", report.unrepaired);
    Ok(())
}
