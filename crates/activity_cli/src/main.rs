//! Terminal front end for the activity list.
//!
//! # Responsibility
//! - Render the projector's view state and forward user intents.
//! - Print each one-shot message once, then clear it.

mod render;

use activity_core::projector::IntentHandle;
use activity_core::{
    default_log_level, init_backend, init_logging, ActivityProjector, ActivityRecord,
    BackendConfig, SqliteActivityStore, ViewState,
};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

type Screen = ActivityProjector<SqliteActivityStore>;

#[derive(Debug, Parser)]
#[command(name = "activity", version, about = "Track a personal list of activities")]
struct Cli {
    /// Database file backing the collection [default: $ACTIVITY_DB_PATH].
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Collection holding the activities [default: $ACTIVITY_COLLECTION].
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Log level: trace|debug|info|warn|error.
    #[arg(long, global = true, env = "ACTIVITY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, global = true, env = "ACTIVITY_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the current list.
    List,
    /// Add an activity.
    Add { name: String },
    /// Flip the completion flag of an activity.
    Toggle { id: String },
    /// Rename an activity.
    Edit { id: String, name: String },
    /// Delete an activity.
    Delete { id: String },
    /// Re-render on every change until interrupted.
    Watch,
    /// Print core linkage information.
    Ping,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    if let Command::Ping = cli.command {
        println!("activity_core ping={}", activity_core::ping());
        println!("activity_core version={}", activity_core::core_version());
        return Ok(());
    }

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy())?;
    }

    let config = resolve_config(&cli)?;
    let client = init_backend(&config).map_err(|err| err.to_string())?;
    let store = Arc::new(client.collection(config.collection.as_str()));
    info!(
        "event=cli_start module=cli status=ok db_path={} collection={}",
        config.db_path.display(),
        config.collection
    );

    let projector = ActivityProjector::start(store).await;
    let view = projector
        .wait_for(SNAPSHOT_TIMEOUT, |view| !view.loading)
        .await
        .ok_or("timed out waiting for the activity list")?;

    let outcome = match cli.command {
        Command::List => {
            print!("{}", render::render_view(&view));
            Ok(())
        }
        Command::Add { name } => add(&projector, &view, &name).await,
        Command::Toggle { id } => toggle(&projector, &view, &id).await,
        Command::Edit { id, name } => edit(&projector, &view, &id, &name).await,
        Command::Delete { id } => delete(&projector, &view, &id).await,
        Command::Watch => watch(&projector).await,
        Command::Ping => Ok(()),
    };

    projector.shutdown().await;
    outcome
}

/// Environment first, then `--db`/`--collection` on top.
fn resolve_config(cli: &Cli) -> Result<BackendConfig, String> {
    BackendConfig::from_env()
        .and_then(|config| config.with_overrides(cli.db.clone(), cli.collection.as_deref()))
        .map_err(|err| err.to_string())
}

fn lookup(view: &ViewState, id: &str) -> Result<ActivityRecord, String> {
    view.find(id)
        .cloned()
        .ok_or_else(|| format!("no activity with id `{id}`"))
}

async fn add(projector: &Screen, view: &ViewState, name: &str) -> Result<(), String> {
    let revision = view.revision;
    let pending = projector.request_add(name);
    settle(projector, pending, |view| view.revision > revision).await
}

async fn toggle(projector: &Screen, view: &ViewState, id: &str) -> Result<(), String> {
    let record = lookup(view, id)?;
    let target = !record.completed;
    let pending = projector.request_toggle(&record);
    settle(projector, pending, |view| {
        view.find(id).is_some_and(|record| record.completed == target)
    })
    .await
}

async fn edit(projector: &Screen, view: &ViewState, id: &str, name: &str) -> Result<(), String> {
    let record = lookup(view, id)?;
    let pending = projector.request_edit(&record, name);
    settle(projector, pending, |view| {
        view.find(id).is_some_and(|record| record.name == name)
    })
    .await
}

/// Deletes `id` whether or not it is still listed.
async fn delete(projector: &Screen, view: &ViewState, id: &str) -> Result<(), String> {
    let record = view
        .find(id)
        .cloned()
        .unwrap_or_else(|| ActivityRecord::id_only(id));
    let pending = projector.request_delete(&record);
    settle(projector, pending, |view| view.find(id).is_none()).await
}

/// Waits for a dispatched intent and, when the store accepted it, for a
/// snapshot satisfying `done`; then renders the result.
async fn settle(
    projector: &Screen,
    pending: Option<IntentHandle>,
    done: impl FnMut(&ViewState) -> bool,
) -> Result<(), String> {
    let accepted = match pending {
        Some(handle) => handle.await.map_err(|err| err.to_string())?,
        None => false,
    };

    let view = if accepted {
        projector
            .wait_for(SNAPSHOT_TIMEOUT, done)
            .await
            .unwrap_or_else(|| projector.state())
    } else {
        projector.state()
    };

    print!("{}", render::render_view(&view));
    if let Some(message) = projector.take_message() {
        println!("\n{message}");
    }
    Ok(())
}

async fn watch(projector: &Screen) -> Result<(), String> {
    let mut receiver = projector.watch();
    loop {
        let message = projector.take_message();
        let view = receiver.borrow_and_update().clone();
        print!("{}", render::render_view(&view));
        if let Some(message) = message {
            println!("\n{message}");
        }
        println!();

        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            signal = tokio::signal::ctrl_c() => {
                return signal.map_err(|err| err.to_string());
            }
        }
    }
}
