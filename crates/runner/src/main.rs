//! `battlefield-runner` -- headless battle runner.
//!
//! Loads the agent catalog from the simulation service, fills the six
//! battle slots, starts one simulation, logs its progress until it
//! finishes and prints the leaderboard.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                 | Description                        |
//! |------------------------|----------|-------------------------|------------------------------------|
//! | `ARENA_API_URL`        | no       | `http://localhost:5000` | Simulation service base URL        |
//! | `POLL_INTERVAL_SECS`   | no       | `2`                     | Seconds between status polls       |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`                    | Per-request HTTP timeout           |
//! | `ARENA_AGENTS`         | no       | autofill                | Six comma-separated identifiers    |
//! | `ARENA_STOCK`          | no       | first dataset           | Dataset file name                  |
//!
//! Exit codes: `0` completed, `1` failed, `2` bad configuration, `130`
//! interrupted.

use std::sync::Arc;

use battlefield_client::api::ArenaApi;
use battlefield_client::controller::Controller;
use battlefield_client::events::RunEvent;
use battlefield_core::lifecycle::{LifecycleViewModel, RunPhase};
use battlefield_core::selection::Slot;
use battlefield_runner::report;
use battlefield_runner::settings::RunnerSettings;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "battlefield_runner=info,battlefield_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = RunnerSettings::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(2);
    });

    tracing::info!(
        api_url = %settings.client.api_url,
        poll_interval_secs = settings.client.poll_interval.as_secs(),
        "Starting battlefield-runner",
    );

    match run(settings).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            std::process::exit(1);
        }
    }
}

async fn run(settings: RunnerSettings) -> anyhow::Result<i32> {
    let api = ArenaApi::new(&settings.client.api_url, settings.client.request_timeout)?;

    match api.health().await {
        Ok(true) => tracing::info!("Simulation service is healthy"),
        Ok(false) => tracing::warn!("Simulation service reported a degraded status"),
        Err(e) => tracing::warn!(error = %e, "Health check failed"),
    }

    let mut controller = Controller::new(Arc::new(api), &settings.client);
    controller.bootstrap().await?;

    match &settings.agents {
        Some(agents) => {
            for (slot, agent) in Slot::ALL.into_iter().zip(agents) {
                if !controller.view().catalog().contains(agent) {
                    tracing::warn!(agent = %agent, "Agent is not in the service catalog");
                }
                controller.select(slot, Some(agent.clone()));
            }
        }
        None => {
            let filled = controller.autofill();
            tracing::info!(filled, "Filled slots from the catalog");
        }
    }

    if let Some(stock) = &settings.stock {
        controller.choose_dataset(Some(stock.clone()));
    }

    let (handle, task) = controller.spawn();

    let mut events = handle.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    handle.submit().await?;

    let view = tokio::select! {
        view = handle.wait_until_settled() => view?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, abandoning the run");
            handle.reset().await?;
            handle.view()
        }
    };

    handle.shutdown();
    task.await?;
    logger.abort();

    Ok(finish(&view))
}

/// Print the outcome and map it to an exit code.
fn finish(view: &LifecycleViewModel) -> i32 {
    match view.phase() {
        RunPhase::Completed => {
            match view.results() {
                Some(results) => {
                    let elapsed = view
                        .started_at()
                        .zip(view.finished_at())
                        .map(|(start, end)| end - start);
                    println!("{}", report::render_results(results, elapsed));
                }
                None => tracing::warn!("Simulation completed without results"),
            }
            0
        }
        RunPhase::Errored => {
            tracing::error!(error = view.error().unwrap_or("unknown error"), "Simulation failed");
            1
        }
        RunPhase::Idle | RunPhase::Running => 130,
    }
}

fn log_event(event: &RunEvent) {
    match event {
        RunEvent::RunStarted {
            simulation_id,
            agents,
            stock,
        } => tracing::info!(%simulation_id, ?agents, %stock, "Battle started"),
        RunEvent::Progress {
            percent, message, ..
        } => tracing::info!(percent, "{message}"),
        RunEvent::AgentGenerating {
            agent,
            index,
            total,
            ..
        } => tracing::info!(%agent, index, total, "Agent generating"),
        RunEvent::GenerationFinished { .. } => tracing::info!("All agents generated"),
        RunEvent::PreviewUpdated { source, .. } => {
            tracing::debug!(source = source.as_deref(), "Code preview updated");
        }
        RunEvent::RunCompleted { simulation_id, .. } => {
            tracing::info!(%simulation_id, "Battle completed");
        }
        RunEvent::RunFailed {
            simulation_id,
            error,
        } => tracing::error!(%simulation_id, %error, "Battle failed"),
        RunEvent::RunReset => tracing::info!("Battle reset"),
    }
}
