use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use vid_caption_tools::counter::{render_table, run_count};

/// Count combinations of weather and hazardous-event attributes across a
/// caption directory.
#[derive(Parser, Debug)]
#[command(name = "caption-count", version, about)]
struct Args {
    /// Directory containing caption JSON files
    #[arg(default_value = "Human_Captions")]
    directory: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let report = run_count(&args.directory).await?;
    print!("{}", render_table(&report));
    Ok(())
}
