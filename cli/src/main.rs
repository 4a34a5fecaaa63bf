//! CLI entrypoint for council
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;
mod render;

use anyhow::{Context, Result, anyhow, bail};
use args::Cli;
use clap::Parser;
use council_application::{NoRoundStore, RoundRequest, RoundStore, StreamCoordinator};
use council_domain::DeliberationEvent;
use council_infrastructure::{
    ConfigLoader, InMemoryRoundGuard, JsonlCallTelemetry, LocalRoundStore, OpenRouterBackend,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

/// Exit code for a round stopped by Ctrl-C
const EXIT_ABORTED: u8 = 130;

/// Logs go to stderr so stdout carries only events. `RUST_LOG` wins over -v.
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "council.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_writer(writer).with_ansi(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

async fn show_round(store: &LocalRoundStore, round_id: &str) -> Result<ExitCode> {
    let Some(round) = store.load(round_id).await.context("cannot read round")? else {
        bail!("no round {round_id} in {}", store.data_dir().display());
    };
    info!(
        round_id,
        state = round.state.as_str(),
        complete = round.is_complete(),
        "Loaded round"
    );
    println!("{}", serde_json::to_string_pretty(&round)?);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref());

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    // Load configuration
    let mut file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("failed to load configuration: {e}"))?
    };
    cli.apply_overrides(&mut file_config);

    for issue in file_config.validate() {
        if !issue.is_error() {
            warn!("config: {issue}");
        }
    }

    if let Some(round_id) = &cli.show_round {
        let store = LocalRoundStore::new(&file_config.storage.data_dir);
        return show_round(&store, round_id).await;
    }

    let Some(question) = cli.question.clone() else {
        bail!("Question is required. Run `council --help` for usage.");
    };
    let config = file_config
        .to_deliberation_config()
        .context("invalid configuration")?;

    info!(
        members = config.selection.members().len(),
        lead = %config.selection.lead(),
        quorum = ?config.quorum,
        "Starting council"
    );

    // === Dependency Injection ===
    let backend = Arc::new(
        OpenRouterBackend::from_env(&file_config.backend.settings())
            .context("cannot create OpenRouter backend")?,
    );
    let store: Arc<dyn RoundStore> = if cli.no_store {
        Arc::new(NoRoundStore)
    } else {
        Arc::new(LocalRoundStore::new(&file_config.storage.data_dir))
    };
    let mut coordinator = StreamCoordinator::new(backend, config)
        .with_store(store)
        .with_guard(Arc::new(InMemoryRoundGuard::new()));
    if let Some(path) = &file_config.storage.telemetry_log {
        match JsonlCallTelemetry::new(path) {
            Some(telemetry) => coordinator = coordinator.with_telemetry(Arc::new(telemetry)),
            None => warn!(path = %path.display(), "Call telemetry disabled"),
        }
    }

    // Build request
    let round_id = cli
        .round_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut request = RoundRequest::new(round_id, question);
    if !cli.model.is_empty() {
        request = request.with_models(cli.model.clone());
    }
    if let Some(lead) = &cli.lead {
        request = request.with_lead(lead.clone());
    }

    let mut handle = coordinator.start(request);
    info!(round_id = %handle.round_id, "Round started");

    let abort = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, aborting round");
            abort.cancel();
        }
    });

    // Stream events
    let mut stdout = std::io::stdout();
    let mut terminal = None;
    while let Some(event) = handle.events.recv().await {
        if let Err(e) = render::write_event(&mut stdout, cli.output, &event) {
            // Closing the stream cancels the round
            warn!(error = %e, "stdout closed, abandoning round");
            break;
        }
        if event.is_terminal() {
            terminal = Some(event);
        }
    }

    let round = match handle.finish().await {
        Ok(round) => round,
        Err(e) => bail!("round rejected: {e}"),
    };
    let usage = round.total_usage();
    info!(
        round_id = %round.round_id,
        state = round.state.as_str(),
        complete = round.is_complete(),
        degraded = round.degraded,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        "Round finished"
    );

    match terminal {
        Some(DeliberationEvent::Stage3Done { .. }) => Ok(ExitCode::SUCCESS),
        Some(DeliberationEvent::Error { kind, message }) => {
            bail!("round failed ({}): {message}", kind.as_str())
        }
        Some(DeliberationEvent::Aborted { .. }) => Ok(ExitCode::from(EXIT_ABORTED)),
        _ => Ok(ExitCode::FAILURE),
    }
}
