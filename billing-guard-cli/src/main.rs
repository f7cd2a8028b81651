//! billing-guard - evaluate an organization's billing snapshot
//!
//! Reads a JSON snapshot of one organization's billing rows, runs the access
//! guard over it, and prints the verdict (with grace-period details and the
//! notification the UI would show) as JSON on stdout.
//!
//! ```text
//! billing-guard <snapshot.json> [--config <guard.toml>]
//! billing-guard --check-config <guard.toml>
//! ```
//!
//! Support uses it to answer "why is this customer locked out?" from an
//! exported row without touching production.

mod observability;
mod snapshot;

use std::{error::Error, path::PathBuf};

use billing_guard::{GuardConfig, GuardError};
use clap::Parser;
use tracing::{debug, info};

use crate::{
    observability::{LogFormat, init_observability},
    snapshot::{SnapshotInput, evaluate},
};

/// Evaluate subscription access for one organization
#[derive(Parser, Debug)]
#[command(name = "billing-guard")]
#[command(about = "Evaluate subscription access for one organization", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON snapshot of the organization's billing rows
    #[arg(required_unless_present = "check_config")]
    snapshot: Option<PathBuf>,

    /// Guard configuration (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate a configuration file and print it (JSON) with defaults filled in
    #[arg(long, value_name = "CONFIG", conflicts_with_all = ["snapshot", "config"])]
    check_config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> billing_guard::Result<GuardConfig> {
    match path {
        Some(path) => {
            let config = GuardConfig::from_file(path)?;
            info!(path = %path.display(), "Loaded guard configuration");
            Ok(config)
        }
        None => {
            debug!("No configuration given, using defaults");
            Ok(GuardConfig::default())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_observability(LogFormat::from_env());

    if let Some(path) = cli.check_config {
        let config = load_config(Some(&path))?;
        println!("{}", serde_json::to_string_pretty(&config).map_err(GuardError::from)?);
        return Ok(());
    }

    let Some(snapshot) = cli.snapshot else {
        return Err("missing snapshot file".into());
    };
    let config = load_config(cli.config.as_ref())?;
    let content = std::fs::read_to_string(&snapshot)
        .map_err(|e| format!("failed to read {}: {e}", snapshot.display()))?;

    let report = evaluate(SnapshotInput::from_json(&content)?, &config).await;
    println!("{}", report.to_json()?);

    Ok(())
}
