use anyhow::Context;
use ppo_api::{app, AppState};
use ppo_infra::app_config::Config;
use ppo_infra::{DbClient, Gateways, StoreOrderRepository, StoreWorkflowRepository};
use ppo_order::{DailyTrigger, JobSchedule, Scheduler};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ppo_api=debug,ppo_order=info,ppo_infra=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting post-purchase orchestrator on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let gateways = Gateways::from_config(&config.gateways).context("Failed to build gateway clients")?;
    let state = AppState::build(
        Arc::new(StoreOrderRepository::new(db.pool.clone())),
        Arc::new(StoreWorkflowRepository::new(db.pool.clone())),
        gateways,
        config.workflow.stale_after(),
    );

    let cancel = CancellationToken::new();
    let jobs = if config.scheduler.enabled {
        let scheduler = Scheduler::new(
            state.collection.clone(),
            JobSchedule {
                trigger: DailyTrigger::parse(&config.scheduler.reminder_time)?,
                deadline: config.scheduler.reminder_deadline(),
            },
            JobSchedule {
                trigger: DailyTrigger::parse(&config.scheduler.auto_charge_time)?,
                deadline: config.scheduler.auto_charge_deadline(),
            },
        );
        scheduler.spawn(cancel.clone())
    } else {
        tracing::info!("Scheduler disabled");
        Vec::new()
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("Server error")?;

    cancel.cancel();
    for job in jobs {
        if let Err(e) = job.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
