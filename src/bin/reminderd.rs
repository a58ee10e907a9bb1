use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use qotd::core::Config;
use qotd::database::Database;
use qotd::features::reminders::{
    DeferredQueue, LogNotifier, Notifier, ReminderConfig, ReminderScheduler, SchedulerDeps,
    SystemClock, WebhookNotifier, REMINDER_JOB_KEY,
};
use qotd::features::status::load_status;
use qotd::remote::{HttpRecordStore, MemoryRecordStore, RecordStore};

/// How often the daemon re-reads settings written by `enable`/`disable`
const SETTINGS_POLL_INTERVAL: Duration = Duration::from_secs(30);

const USAGE: &str = "usage: reminderd [run | status | enable HH:MM | disable]
  run and status need QOTD_USER_ID; enable and disable only touch the local database";

enum Command {
    Run,
    Status,
    Enable { hour: i64, minute: i64 },
    Disable,
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        None | Some("run") => Ok(Command::Run),
        Some("status") => Ok(Command::Status),
        Some("disable") => Ok(Command::Disable),
        Some("enable") => {
            let time = args
                .get(1)
                .ok_or_else(|| anyhow!("enable needs a time, e.g. `enable 20:30`"))?;
            let (hour, minute) = parse_time_of_day(time)?;
            Ok(Command::Enable { hour, minute })
        }
        Some(other) => Err(anyhow!("Unknown command '{other}'\n{USAGE}")),
    }
}

fn parse_time_of_day(raw: &str) -> Result<(i64, i64)> {
    let (hour, minute) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid time '{raw}', expected HH:MM"))?;
    let hour: i64 = hour
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid hour in '{raw}'"))?;
    let minute: i64 = minute
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid minute in '{raw}'"))?;
    if !(0..=23).contains(&hour) || !(0..=59).contains(&minute) {
        return Err(anyhow!("Time '{raw}' is out of range"));
    }
    Ok((hour, minute))
}

fn build_records(config: &Config) -> Result<Arc<dyn RecordStore>> {
    match &config.records_url {
        Some(url) => {
            info!("🌐 Using remote record store at {url}");
            Ok(Arc::new(HttpRecordStore::new(
                url,
                config.records_token.clone(),
                config.remote_timeout,
            )?))
        }
        None => {
            warn!("QOTD_RECORDS_URL not set, using an empty in-memory record store");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
    }
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    match &config.notify_url {
        Some(url) => {
            info!("📨 Delivering notifications to {url}");
            Ok(Arc::new(WebhookNotifier::new(url, config.remote_timeout)?))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

async fn print_status(config: &Config, database: &Database) -> Result<()> {
    let settings = ReminderConfig::load(database).await?;
    println!(
        "Reminders: {} at {:02}:{:02}",
        if settings.enabled { "enabled" } else { "disabled" },
        settings.hour,
        settings.minute
    );
    match database.load_pending_job(REMINDER_JOB_KEY).await? {
        Some(due) => println!("Next reminder: {}", due.with_timezone(&chrono::Local)),
        None => println!("Next reminder: none pending"),
    }

    let user_id = config.require_user_id()?;
    let records = build_records(config)?;
    match load_status(records.as_ref(), user_id).await {
        Ok(status) => {
            println!("Streak: {} day(s)", status.streak);
            let unlocked = status.unlocked();
            if unlocked.is_empty() {
                println!("Achievements: none yet");
            } else {
                println!("Achievements: {}", unlocked.join(", "));
            }
        }
        Err(e) => println!("Streak: unavailable ({e})"),
    }
    Ok(())
}

async fn run(config: Config, database: Database) -> Result<()> {
    let user_id = config.require_user_id()?.to_string();
    let scheduler = ReminderScheduler::new(
        SystemClock,
        SchedulerDeps {
            queue: DeferredQueue::new(),
            records: build_records(&config)?,
            notifier: build_notifier(&config)?,
            database,
            user_id,
            remote_timeout: config.remote_timeout,
        },
    );

    match scheduler.restore().await? {
        Some(due) => info!("✅ Reminder daemon running, next reminder at {due}"),
        None => info!("✅ Reminder daemon running, reminders are disabled"),
    }

    let mut interval = tokio::time::interval(SETTINGS_POLL_INTERVAL);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = scheduler.sync_settings().await {
                    error!("Failed to reload reminder settings: {e:#}");
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {e}");
                }
                break;
            }
        }
    }

    info!("Shutting down reminder daemon");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let database = Database::new(&config.database_path).await?;

    match command {
        Command::Run => run(config, database).await,
        Command::Status => print_status(&config, &database).await,
        Command::Enable { hour, minute } => {
            let settings = ReminderConfig::new(true, hour, minute);
            settings.save(&database).await?;
            println!(
                "Reminders enabled at {:02}:{:02}",
                settings.hour, settings.minute
            );
            Ok(())
        }
        Command::Disable => {
            let mut settings = ReminderConfig::load(&database).await?;
            settings.enabled = false;
            settings.save(&database).await?;
            println!("Reminders disabled");
            Ok(())
        }
    }
}
