use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use tokio::sync::mpsc::unbounded_channel;
use tracing_subscriber::EnvFilter;

use stashhook::{announce, config::ReceiverConfig, server};

#[derive(Parser)]
#[command(version)]
struct Opts {
    /// Configuration file for stashhook
    #[arg(short, long)]
    config: PathBuf,
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();
    let config = ReceiverConfig::load(&opts.config)?;
    let validator = config
        .validator()
        .context("refusing to start with this configuration")?;

    let (sender, receiver) = unbounded_channel();
    tokio::spawn(announce::run(receiver));

    server::build(validator, sender)
        .launch()
        .await
        .map_err(|err| anyhow!("webhook receiver failed: {}", err))?;

    Ok(())
}
