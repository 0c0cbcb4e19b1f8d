use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gallery::RedisStore;
use process::models::{DEFAULT_BASE_URL, DEFAULT_REDIS_URL};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the images
    dir: PathBuf,

    #[arg(long, default_value = DEFAULT_REDIS_URL)]
    redis_url: String,

    /// Prefix prepended to each file's relative path to form its locator
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long)]
    recursive: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let store = RedisStore::connect(&args.redis_url)
        .await
        .with_context(|| format!("Failed to connect to {}", args.redis_url))?;

    process::load_images(&store, &args.dir, &args.base_url, args.recursive).await?;

    Ok(())
}
