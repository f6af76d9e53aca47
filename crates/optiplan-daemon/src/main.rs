use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};

use optiplan::config::{load_config, Config};
use optiplan::db::Database;
use optiplan::error::{ConfigError, OptiplanError, Result};
use optiplan::order::lifecycle::ORDER_ENTITY;
use optiplan::outbox::{MikroHttpHandler, OutboxProcessor, DEFAULT_BATCH_SIZE};
use optiplan::reminder::{LogNotifier, ReminderJob, ReminderPolicy};
use optiplan::scheduler::Scheduler;
use optiplan::telemetry;

const OUTBOX_JOB: &str = "outbox";
const REMINDER_JOB: &str = "reminders";

/// `optiplan-daemon [config.json]`, defaulting to `~/.optiplan/config.json`.
fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".optiplan").join("config.json")))
}

fn main() {
    let Some(path) = config_path() else {
        eprintln!("No config path given and no home directory found");
        std::process::exit(2);
    };

    let config = match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", path.display(), e);
            std::process::exit(2);
        }
    };

    if let Err(e) = telemetry::init(config.logging.format, config.logging.filter.as_deref()) {
        eprintln!("{}", e);
        std::process::exit(2);
    }

    info!("Starting OptiPlan daemon v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config) {
        error!("Daemon stopped: {}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    let db_path = config.database_file().ok_or_else(|| ConfigError::Validation {
        message: "database_path is not set and no home directory was found".to_string(),
    })?;
    let db = Database::open(&db_path)?;

    let mut scheduler = Scheduler::new();
    register_outbox(&mut scheduler, config, &db)?;
    register_reminders(&mut scheduler, config, &db)?;

    if scheduler.job_names().is_empty() {
        warn!("No background jobs are enabled; exiting");
        return Ok(());
    }

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| ConfigError::Validation {
        message: format!("Failed to install signal handler: {}", e),
    })?;

    info!("Running jobs: {}", scheduler.job_names().join(", "));
    let _ = stop_rx.recv();

    info!("Shutdown requested");
    scheduler.shutdown();
    Ok(())
}

fn register_outbox(scheduler: &mut Scheduler, config: &Config, db: &Database) -> Result<()> {
    let Some(base_url) = &config.outbox.mikro_base_url else {
        info!("Outbox disabled: no mikro_base_url configured");
        return Ok(());
    };

    let mut handler = MikroHttpHandler::new(base_url)?;
    if let Some(token) = config.outbox.mikro_token.resolve("outbox.mikro_token")? {
        handler = handler.with_token(token);
    }

    let processor = Arc::new(
        OutboxProcessor::new(db.clone())
            .register(ORDER_ENTITY, Arc::new(handler))
            .with_permanent_codes(config.outbox.permanent_codes.clone())
            .with_dispatch_timeout(Duration::from_secs(config.outbox.dispatch_timeout_secs)),
    );

    scheduler.schedule(
        OUTBOX_JOB,
        Duration::from_secs(config.outbox.interval_secs),
        move || {
            let processor = Arc::clone(&processor);
            async move {
                if let Err(e) = processor.process_pending(DEFAULT_BATCH_SIZE).await {
                    error!("Outbox batch failed: {}", e);
                }
            }
        },
    )?;
    Ok(())
}

fn register_reminders(scheduler: &mut Scheduler, config: &Config, db: &Database) -> Result<()> {
    if !config.reminders.enabled {
        info!("Reminders disabled");
        return Ok(());
    }

    let job = Arc::new(
        ReminderJob::new(db.clone(), Arc::new(LogNotifier)).with_policy(ReminderPolicy {
            max_reminders: config.reminders.max_reminders,
            min_gap: chrono::Duration::hours(config.reminders.min_gap_hours),
        }),
    );

    scheduler.schedule(
        REMINDER_JOB,
        Duration::from_secs(config.reminders.interval_secs),
        move || {
            let job = Arc::clone(&job);
            async move {
                if let Err(e) = job.run_once(Utc::now()).await {
                    error!("Reminder pass failed: {}", OptiplanError::from(e));
                }
            }
        },
    )?;
    Ok(())
}
