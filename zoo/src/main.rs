#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::net::SocketAddr;
use std::sync::Arc;

use args::{Args, Command};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use zoo_config::Config;
use zoo_orchestrator::{SlotState, SubmissionOrchestrator, SubmitRequest};
use zoo_providers::{PredictionPoller, ProviderRegistry};
use zoo_server::Server;
use zoo_store::InMemoryPredictionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    let _telemetry_guard = zoo_telemetry::init(config.telemetry.as_ref(), "info")?;

    tracing::info!(config_path = %args.config.display(), "starting zoo");

    match args.command {
        None => serve(config, None).await,
        Some(Command::Serve { listen }) => serve(config, listen).await,
        Some(Command::Generate {
            prompt,
            models,
            outputs,
            anon_id,
        }) => generate(config, prompt, &models, outputs, anon_id).await,
    }
}

async fn serve(config: Config, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    let mut server = Server::new(config)?;
    if let Some(listen) = listen {
        server = server.with_listen_address(listen);
    }

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.cancel();
    });

    server.serve(shutdown).await?;

    tracing::info!("zoo stopped");
    Ok(())
}

/// Run a submission in-process and print every slot once it settles
async fn generate(
    config: Config,
    prompt: String,
    names: &[String],
    outputs: u32,
    anon_id: Option<String>,
) -> anyhow::Result<()> {
    let models = if names.is_empty() {
        config.default_models()
    } else {
        names
            .iter()
            .map(|name| {
                config
                    .model(name)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("unknown model '{name}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    if models.is_empty() {
        anyhow::bail!("no models selected; pass --model or mark catalog models as checked");
    }

    let registry = ProviderRegistry::from_config(&config.providers)?;
    let orchestrator = SubmissionOrchestrator::new(
        registry,
        Arc::new(InMemoryPredictionStore::new()),
        PredictionPoller::new(config.poller.interval),
    );

    let mut handle = orchestrator.submit(SubmitRequest {
        prompt,
        models,
        outputs_per_model: outputs,
        anon_id,
    });

    let cancel_on_signal = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            shutdown_signal().await;
            orchestrator.shutdown();
        }
    });

    let mut printed = vec![false; handle.view().slots.len()];
    let mut view = handle.view();
    loop {
        for slot in &view.slots {
            let index = slot.key.index();
            if printed[index] || !slot.is_settled() {
                continue;
            }
            printed[index] = true;
            println!("{}", serde_json::to_string(slot)?);
        }

        if view.is_settled() {
            break;
        }

        match handle.changed().await {
            Some(next) => view = next,
            None => break,
        }
    }

    cancel_on_signal.abort();

    let failed = view
        .slots
        .iter()
        .filter(|slot| {
            matches!(slot.state, SlotState::Failed { .. })
                || slot.prediction().is_some_and(|p| p.error.is_some())
        })
        .count();

    tracing::info!(
        submission_id = %view.submission_id,
        slots = view.slots.len(),
        failed,
        "submission finished"
    );

    if failed > 0 {
        anyhow::bail!("{failed} of {} predictions failed", view.slots.len());
    }

    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
