use std::path::Path;

use clap::Parser;
use rss_tagger::{GeminiClient, GenConfig, KeywordAugmenter};
use tracing::info;

/// Tag every feed file in the current directory with generated keywords.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let _args = Args::parse();

    let config = GenConfig::load();
    let model = GeminiClient::new(config);
    let augmenter = KeywordAugmenter::new(Box::new(model));

    let files = augmenter.run(Path::new(".")).await?;
    info!("Processed {} feed files", files);
    Ok(())
}
