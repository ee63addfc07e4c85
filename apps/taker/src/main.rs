use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{HttpBackend, HttpEvaluationSource, HttpSubmissionSink, SessionDependencies};
use shared::domain::{EvaluationId, RespondentId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod controller;

use config::{load_settings, normalize_base_url};
use console::ConsoleNotifier;
use controller::orchestration::{run_session, start_session};

#[derive(Parser, Debug)]
#[command(about = "Take a timed evaluation from the terminal")]
struct Args {
    #[arg(long)]
    evaluation_id: i64,
    #[arg(long)]
    respondent_id: i64,
    /// Overrides `api_base_url` from the config file and environment.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(api_url) = args.api_url {
        settings.api_base_url = api_url;
    }
    let base_url = normalize_base_url(&settings.api_base_url)?;
    info!(%base_url, evaluation_id = args.evaluation_id, "taker starting");

    let mut backend = HttpBackend::with_timeout(base_url, settings.request_timeout())?;
    if let Some(token) = &settings.auth_token {
        backend = backend.with_auth_token(token.clone());
    }
    let deps = SessionDependencies {
        source: Arc::new(HttpEvaluationSource::new(backend.clone())),
        sink: Arc::new(HttpSubmissionSink::new(backend)),
        notifier: Arc::new(ConsoleNotifier),
    };

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut out = std::io::stdout();
    let Some(controller) = start_session(
        &deps,
        EvaluationId(args.evaluation_id),
        RespondentId(args.respondent_id),
        settings.session_config(),
        &mut input,
        &mut out,
    )
    .await?
    else {
        return Ok(());
    };

    run_session(controller, &mut input, &mut out).await
}
