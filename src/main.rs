mod cli;
mod logging;

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, ConfirmArgs, HistoryArgs};
use colored::*;
use dotenv::dotenv;
use occurrence_sweep::service::HistoryQuery;
use occurrence_sweep::storage::PgRepository;
use occurrence_sweep::{
    AppConfig, OccurrenceRepository, OccurrenceService, PhotoStore, Scheduler, SweepOutcome,
    Sweeper,
};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger(&logging::LogSettings::from_env());

    let config = match occurrence_sweep::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve(args)) => run_serve(&config, args.max_sweeps),
        Some(Commands::Sweep) => run_sweep(&config),
        Some(Commands::Scan) => run_scan(&config),
        Some(Commands::Orphans) => run_orphans(&config),
        Some(Commands::History(args)) => run_history(&config, args),
        Some(Commands::Confirm(args)) => run_confirm(&config, args),
        Some(Commands::Migrate) => run_migrate(&config),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn open_repository(config: &AppConfig) -> anyhow::Result<Arc<PgRepository>> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;
    let repository = PgRepository::connect(
        url,
        config.pool_max_size,
        config.pool_connection_timeout(),
    )
    .context("Error connecting to database")?;
    Ok(Arc::new(repository))
}

fn build_sweeper(config: &AppConfig) -> anyhow::Result<Sweeper> {
    let repository: Arc<dyn OccurrenceRepository> = open_repository(config)?;
    let photos = PhotoStore::new(&config.photo_dir);
    photos
        .ensure_root()
        .with_context(|| format!("Photo directory {} unusable", config.photo_dir.display()))?;
    Ok(Sweeper::from_config(config, repository, photos)?)
}

fn run_serve(config: &AppConfig, max_sweeps: Option<usize>) -> anyhow::Result<()> {
    info!("Initializing timers to cleanup database");
    let sweeper = Arc::new(build_sweeper(config)?);
    let scheduler = Scheduler::start(Arc::clone(&sweeper), config.sweep_interval(), max_sweeps)?;

    if max_sweeps.is_some() {
        let tally = scheduler.wait();
        info!(
            "{} sweeps completed out of {} attempts",
            format!("{}", tally.completed).green(),
            tally.attempted
        );
        return Ok(());
    }

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(wait_for_shutdown_signal())?;

    info!("Shutdown requested, waiting for the running sweep");
    match scheduler.shutdown(config.shutdown_grace()) {
        Some(tally) => {
            info!("Gracefully exited after {} sweeps", tally.completed);
            // Scheduler thread has finished, so this is the last handle to
            // the repository and the connection pool closes here.
            drop(sweeper);
        }
        None => {
            // The detached scheduler thread still owns a handle; the pool
            // goes away with the process.
            error!("Sweep abandoned on exit, connection pool closes with the process");
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

fn run_sweep(config: &AppConfig) -> anyhow::Result<()> {
    let sweeper = build_sweeper(config)?;
    match sweeper.run_once()? {
        SweepOutcome::Completed(report) => {
            info!(
                "{} repeated, {} purged, {} failed, {} files removed in {}",
                format!("{}", report.duplicates_found).red(),
                format!("{}", report.purged).green(),
                format!("{}", report.purge_failures).red(),
                format!("{}", report.files_removed).cyan(),
                format!("{:.2}s", report.duration.as_secs_f64()).green(),
            );
            if let Some(orphans) = report.orphans {
                info!(
                    "{} orphan photos removed, {} failed",
                    format!("{}", orphans.removed).cyan(),
                    format!("{}", orphans.failed).red(),
                );
            }
        }
        SweepOutcome::Skipped => info!("Another sweep is running"),
    }
    Ok(())
}

fn run_scan(config: &AppConfig) -> anyhow::Result<()> {
    let sweeper = build_sweeper(config)?;
    let duplicates = sweeper.scanner().scan()?;
    for record in &duplicates {
        println!(
            "{}  device={} {} {} parish={} anomaly={}",
            record.row_id.yellow(),
            record.device_id,
            record.submitted_on,
            record.submitted_at,
            record.parish,
            record.anomaly_code
        );
    }
    info!("{} entries would be purged", format!("{}", duplicates.len()).red());
    Ok(())
}

fn run_orphans(config: &AppConfig) -> anyhow::Result<()> {
    let sweeper = build_sweeper(config)?;
    let Some(collector) = sweeper.orphan_collector() else {
        info!("Orphan sweep is disabled");
        return Ok(());
    };
    let orphans = collector.find_orphans()?;
    for photo in &orphans {
        println!("{}", photo.name.yellow());
    }
    info!("{} photos would be removed", format!("{}", orphans.len()).red());
    Ok(())
}

fn run_history(config: &AppConfig, args: HistoryArgs) -> anyhow::Result<()> {
    let service = OccurrenceService::new(open_repository(config)?);
    let query = match (args.device, args.occurrence) {
        (Some(device), _) => HistoryQuery::Device(device),
        (None, Some(row_id)) => HistoryQuery::Occurrence(row_id),
        (None, None) => HistoryQuery::OpenMap,
    };
    let entries = service.history(&query)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn run_confirm(config: &AppConfig, args: ConfirmArgs) -> anyhow::Result<()> {
    let service = OccurrenceService::new(open_repository(config)?);
    let authority = service.confirm_resolution(&args.authority, &args.row_id, &args.key)?;
    println!("Occurrence {} marked as resolved by {}", args.row_id.green(), authority);
    Ok(())
}

fn run_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let repository = open_repository(config)?;
    let applied = repository.run_migrations()?;
    info!("{} migrations applied", applied);
    Ok(())
}
