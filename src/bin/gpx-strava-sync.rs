//! gpx-strava-sync - upload new GPX tracks to Strava
//!
//! Usage:
//!   gpx-strava-sync <client_id> <client_secret> <refresh_token> [--all]
//!
//! Tracks are read from `GPX_OUT` (or the folder named by `GPX_FOLDER`). Only
//! tracks that start after the latest Strava activity are considered, unless
//! `--all` is given. Tracks Strava already has are skipped.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use gpx_sync::{ensure_folder, StravaClient, SyncConfig, SyncDriver, SyncError};
use log::error;

#[derive(Parser)]
#[command(name = "gpx-strava-sync")]
#[command(
    about = "Upload new GPX tracks to Strava, skipping ones it already has",
    long_about = None
)]
struct Cli {
    /// Strava client id
    client_id: String,

    /// Strava client secret
    client_secret: String,

    /// Strava refresh token
    refresh_token: String,

    /// Upload every track without checking the last synced time
    #[arg(long)]
    all: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), SyncError> {
    let config = SyncConfig {
        force_all: cli.all,
        ..SyncConfig::with_folder(SyncConfig::folder_from_env())
    };

    // Before credentials, so a failed login still leaves the folder in place
    ensure_folder(&config.folder)?;

    let client =
        StravaClient::connect(&cli.client_id, &cli.client_secret, &cli.refresh_token).await?;

    let mut driver = SyncDriver::new(client, config);
    driver.run().await?;
    Ok(())
}
