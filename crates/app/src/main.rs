use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use services::{OutcomeWatcher, ResumeService, WatchState, WatcherSettings};
use storage::repository::Storage;
use watch_core::model::CompletionResult;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod replay;

use replay::{ConsoleHost, ConsoleSurface, PrintingSink, ReplayScript, ScriptedWidget};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingReplay,
    UnknownArg(String),
    InvalidFrames { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingReplay => write!(f, "--replay <file.json> is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidFrames { raw } => write!(f, "invalid --ready-after value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  ivwatch-replay --replay <file.json> [--settings <file.toml>] [--db <sqlite_url>] \
         [--edit] [--ready-after <frames>]"
    );
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite::memory:");
    eprintln!("  --ready-after 0");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  IVWATCH_DB_URL, RUST_LOG");
}

struct Args {
    replay: PathBuf,
    settings: Option<PathBuf>,
    db_url: Option<String>,
    edit_mode: bool,
    ready_after: u64,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut replay = None;
        let mut settings = None;
        let mut db_url = std::env::var("IVWATCH_DB_URL").ok();
        let mut edit_mode = false;
        let mut ready_after = 0;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--replay" => replay = Some(PathBuf::from(require_value(args, "--replay")?)),
                "--settings" => {
                    settings = Some(PathBuf::from(require_value(args, "--settings")?));
                }
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if !value.starts_with("sqlite:") {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(value);
                }
                "--edit" => edit_mode = true,
                "--ready-after" => {
                    let value = require_value(args, "--ready-after")?;
                    ready_after = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidFrames { raw: value.clone() })?;
                }
                "--help" | "-h" => return Ok(None),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Some(Self {
            replay: replay.ok_or(ArgsError::MissingReplay)?,
            settings,
            db_url,
            edit_mode,
            ready_after,
        }))
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<WatcherSettings, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(WatcherSettings::from_toml_str(&std::fs::read_to_string(path)?)?),
        None => Ok(WatcherSettings::default()),
    }
}

async fn open_storage(db_url: Option<&str>) -> Result<Storage, Box<dyn std::error::Error>> {
    match db_url {
        Some(url) => Ok(Storage::sqlite(url).await?),
        None => Ok(Storage::in_memory()),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let Some(args) = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?
    else {
        print_usage();
        return Ok(());
    };

    let settings = load_settings(args.settings.as_ref())?;
    let script: ReplayScript = serde_json::from_str(&std::fs::read_to_string(&args.replay)?)?;
    let storage = open_storage(args.db_url.as_deref()).await?;

    let outcome = replay(script, settings, &storage, args.edit_mode, args.ready_after).await?;
    info!(final_state = ?outcome.final_state, "replay finished");

    match outcome.result {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("null"),
    }
    Ok(())
}

struct ReplayOutcome {
    final_state: WatchState,
    result: Option<CompletionResult>,
    host: Arc<ConsoleHost>,
}

async fn replay(
    script: ReplayScript,
    settings: WatcherSettings,
    storage: &Storage,
    edit_mode: bool,
    ready_after: u64,
) -> Result<ReplayOutcome, Box<dyn std::error::Error>> {
    let user = script.user_id;
    let prepared = ResumeService::new(Arc::clone(&storage.states))
        .prepare(script.session, &[user], watch_core::Clock::default().now())
        .await?;
    if let Some(e) = &prepared.resume_error {
        warn!(error = %e, "replaying without resumed state");
    }

    let host = Arc::new(ConsoleHost::new(edit_mode, user));
    let sink = Arc::new(PrintingSink::default());
    let settle = settings.settle_delay() + settings.branch_delay();
    let watcher = OutcomeWatcher::new(
        host.clone(),
        Arc::new(ConsoleSurface),
        sink.clone(),
        Arc::clone(&storage.states),
        settings,
    );

    let widget = Arc::new(ScriptedWidget::new(ready_after));
    let handle = watcher.attach(prepared.session, widget.clone()).await;
    let state = handle
        .wait_for_state(|s| !matches!(s, WatchState::Idle | WatchState::WaitingForWidgetReady))
        .await;
    info!(?state, statements = script.statements.len(), "replaying");

    for statement in script.statements {
        if !widget.emit(statement) {
            warn!("widget has no listener; remaining statements dropped");
            break;
        }
    }
    if let Some(decision) = script.decision {
        handle.choose(decision.into());
    }
    if let Some(progress) = script.progress {
        widget.set_progress(progress);
    }

    tokio::time::sleep(settle).await;
    let final_state = handle.close().await;

    Ok(ReplayOutcome {
        final_state,
        result: sink.reported().or_else(|| handle.completion()),
        host,
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offer_script(decision: &str) -> ReplayScript {
        serde_json::from_value(json!({
            "session": {
                "sessionId": 4,
                "trackingMode": "completePass",
                "maxPoints": 10,
                "branchRules": {
                    "onFail": { "enabled": true, "forced": false, "targetTime": 30000, "showText": false }
                }
            },
            "statements": [{
                "verb": { "id": "http://adlnet.gov/expapi/verbs/completed" },
                "object": { "id": "https://lms.example/h5p/embed/4" },
                "result": { "score": { "raw": 2, "max": 10, "scaled": 0.2 } }
            }],
            "decision": decision
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_decision_answers_the_offer_from_the_last_statement() {
        let storage = Storage::in_memory();
        let outcome = replay(offer_script("continue"), WatcherSettings::default(), &storage, false, 0)
            .await
            .unwrap();

        assert_eq!(outcome.final_state, WatchState::Completed);
        assert!(outcome.result.is_some());
        assert_eq!(outcome.host.seeks(), vec![30000]);
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_offer_never_seeks() {
        let storage = Storage::in_memory();
        let outcome = replay(offer_script("dismiss"), WatcherSettings::default(), &storage, false, 0)
            .await
            .unwrap();

        assert_eq!(outcome.final_state, WatchState::Completed);
        assert!(outcome.host.seeks().is_empty());
    }
}
