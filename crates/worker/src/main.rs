//! `plantwatch-worker` -- replays historical sensor data into the telemetry
//! store as a live stream.
//!
//! ```text
//! plantwatch-worker [replay]                     # replay until finished or Ctrl-C
//! plantwatch-worker inject <MACHINE_ID> <KIND>   # KIND: thermal | fan | strain | wear
//! ```
//!
//! # Environment variables
//!
//! | Variable            | Required | Default                 |
//! |---------------------|----------|-------------------------|
//! | `DATABASE_URL`      | yes      | --                      |
//! | `REPLAY_CSV_PATH`   | no       | `data/real_sensors.csv` |
//! | `REPLAY_SPEED`      | no       | `1.0`                   |
//! | `REPLAY_START_ROW`  | no       | `0`                     |
//!
//! See [`plantwatch_worker::config::ReplayConfig::from_env`] for the rest.

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use plantwatch_core::error::CoreError;
use plantwatch_core::ports::TelemetryReader;
use plantwatch_core::thresholds::ThresholdConfig;
use plantwatch_core::types::MachineId;
use plantwatch_core::verdict::FailureKind;
use plantwatch_db::PgTelemetryStore;
use plantwatch_replay::{Ai4iOptions, ReplayScheduler, ReplayTable};
use plantwatch_worker::config::{default_machine_ids, ReplayConfig};
use plantwatch_worker::inject::inject_failure;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "plantwatch-worker")]
#[command(about = "Replay historical sensor data into the telemetry store", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream the replay source into the store (the default)
    Replay,

    /// Append one synthetic snapshot that trips a failure rule
    Inject {
        /// Registered machine to inject for
        machine_id: MachineId,

        /// Failure to trip: thermal, fan, strain or wear (or a code like FF-001)
        #[arg(value_parser = parse_failure_kind)]
        kind: FailureKind,
    },
}

fn parse_failure_kind(raw: &str) -> Result<FailureKind, String> {
    FailureKind::parse(raw)
        .ok_or_else(|| format!("unknown failure kind {raw:?} (expected thermal, fan, strain or wear)"))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plantwatch_worker=info,plantwatch_replay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = Cli::parse().command.unwrap_or(Commands::Replay);

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::error!("DATABASE_URL environment variable is required");
        std::process::exit(1);
    });

    let pool = plantwatch_db::create_pool(&database_url)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        });
    if let Err(e) = plantwatch_db::health_check(&pool).await {
        tracing::error!(error = %e, "Database health check failed");
        std::process::exit(1);
    }
    if let Err(e) = plantwatch_db::run_migrations(&pool).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }

    let store = Arc::new(PgTelemetryStore::new(pool));

    let outcome = match command {
        Commands::Inject { machine_id, kind } => run_inject(&store, machine_id, kind).await,
        Commands::Replay => run_replay(store).await,
    };
    if let Err(e) = outcome {
        tracing::error!(error = %e, "Worker failed");
        std::process::exit(1);
    }
}

async fn run_inject(
    store: &PgTelemetryStore,
    machine_id: MachineId,
    kind: FailureKind,
) -> Result<(), CoreError> {
    let thresholds = ThresholdConfig::from_env()?;
    let snapshot = inject_failure(store, machine_id, kind, &thresholds, Utc::now()).await?;
    println!(
        "Injected {} ({}) for machine {machine_id} at {}",
        kind.label(),
        kind.code(),
        snapshot.timestamp.to_rfc3339()
    );
    Ok(())
}

async fn run_replay(store: Arc<PgTelemetryStore>) -> Result<(), CoreError> {
    let config = ReplayConfig::from_env()?;
    let machine_ids = resolve_machine_ids(&config, store.as_ref()).await?;

    let options = Ai4iOptions {
        interval: config.row_interval,
        limit: config.row_limit,
        ..Ai4iOptions::new(machine_ids, Utc::now())
    };
    let (table, report) =
        ReplayTable::from_ai4i_csv(&config.csv_path, &options).map_err(|e| {
            CoreError::InvalidParameter(format!("{}: {e}", config.csv_path.display()))
        })?;
    tracing::info!(
        path = %config.csv_path.display(),
        loaded = report.loaded,
        skipped = report.skipped,
        machines = options.machine_ids.len(),
        "Replay source loaded"
    );

    let scheduler =
        ReplayScheduler::new(Arc::new(table), store).with_timestamp_mode(config.timestamp_mode);
    scheduler.start(config.speed, config.start_row).await?;

    tokio::select! {
        status = scheduler.wait_until_stopped() => {
            tracing::info!(?status, "Replay ended");
        }
        _ = tokio::signal::ctrl_c() => {
            let status = scheduler.stop().await;
            tracing::info!(?status, "Replay interrupted");
        }
    }
    Ok(())
}

/// Explicit ids win; otherwise every machine in the store; otherwise the
/// default fleet.
async fn resolve_machine_ids(
    config: &ReplayConfig,
    store: &dyn TelemetryReader,
) -> Result<Vec<MachineId>, CoreError> {
    if let Some(ids) = &config.machine_ids {
        return Ok(ids.clone());
    }
    let registered = store.machine_ids().await?;
    if registered.is_empty() {
        tracing::warn!(
            "No machines registered; rows for the default fleet will be rejected until they are"
        );
        return Ok(default_machine_ids());
    }
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn replay_is_the_default() {
        let cli = Cli::try_parse_from(["plantwatch-worker"]).unwrap();
        assert!(cli.command.is_none());
        let cli = Cli::try_parse_from(["plantwatch-worker", "replay"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Replay)));
    }

    #[test]
    fn inject_parses_machine_and_kind() {
        let cli = Cli::try_parse_from(["plantwatch-worker", "inject", "4", "FF-001"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Inject {
                machine_id: 4,
                kind: FailureKind::FanFailure
            })
        ));
    }

    #[test]
    fn inject_rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["plantwatch-worker", "inject", "4", "smoke"]).is_err());
        assert!(Cli::try_parse_from(["plantwatch-worker", "inject", "four", "fan"]).is_err());
        assert!(Cli::try_parse_from(["plantwatch-worker", "inject", "4"]).is_err());
    }
}
