//! macta command-line binary.
//!
//! # Environment Variables
//!
//! - `MACTA_CONFIG` — YAML configuration file (overridden by `--config`)
//! - `MACTA_MODEL_DIR` — pretrained model cache (default: `~/.macta/models`)
//! - `RUST_LOG` — Log filter (default: "info,macta=debug")
//!
//! # Usage
//!
//! ```bash
//! macta run pbmc.json markers.json marker labels out.json -t '*'
//! macta list tools
//! ```

use clap::Parser;
use macta::cli::{execute, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; `log` records are bridged into the subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,macta=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    execute(Cli::parse()).await
}
