//! layerfs entry point.
//!
//! ```bash
//! layerfs --layer ./overlay --layer ./base ls /etc
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*};

use layerfs_cli::{Cli, log_filter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(rust_log.as_deref(), cli.verbose))
        .init();

    layerfs_cli::run(cli).await
}
