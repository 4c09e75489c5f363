use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};

use feedwire::app::control::{self, run_command_loop, run_event_loop};
use feedwire::app::scheduler::Scheduler;
use feedwire::domain::error::ErrorKind;
use feedwire::infra::config::WorkerConfig;
use feedwire::infra::logging::{init_logging, BootError};
use feedwire::infra::memory_bus::MemoryBus;
use feedwire::infra::postgres_repo::{create_pool, PostgresRepo};
use feedwire::infra::reqwest_http::ReqwestHttp;
use feedwire::infra::system_clock::SystemClock;

#[tokio::main]
async fn main() -> Result<(), BootError> {
    let cfg_path = pick_config_path(std::env::args().nth(1));
    let cfg = WorkerConfig::load(&cfg_path)
        .await
        .map_err(|e| BootError::Fatal(e.to_string()))?;
    init_logging(&cfg.log_level);

    info!(
        config = %cfg_path.display(),
        seeds = cfg.seeds.len(),
        "Loaded config"
    );

    let pool = match create_pool(&cfg.postgres).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(kind = ErrorKind::DbConnect.tag(), error = %e, "Store connection failed");
            return Err(BootError::Fatal(e));
        }
    };
    let repo = Arc::new(PostgresRepo::new(pool));
    repo.migrate().await.map_err(BootError::Fatal)?;

    let http = Arc::new(
        ReqwestHttp::new(cfg.user_agent.clone(), cfg.fetch_timeout())
            .map_err(|e| BootError::Fatal(e.to_string()))?,
    );
    let clock = Arc::new(SystemClock);

    // One in-process bus; the publisher and subscriber sides are separate
    // handles, matching the distinct-connection rule of networked transports.
    let bus = MemoryBus::new();
    let publisher = Arc::new(bus.clone());
    let subscriber = bus;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let shutdown = Arc::new(Notify::new());
    let scheduler = Scheduler::new(
        Arc::new(cfg.clone()),
        repo.clone(),
        http,
        clock,
        events_tx,
    );

    tokio::spawn(run_event_loop(
        events_rx,
        publisher.clone(),
        repo.clone(),
        shutdown.clone(),
    ));
    {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            if let Err(e) = run_command_loop(&subscriber, scheduler).await {
                error!(error = %e, "Command loop stopped");
            }
        });
    }

    let started = scheduler.init().await;
    for seed in cfg.seeds.clone() {
        scheduler.add(seed).await;
    }
    info!(feeds = started, "Worker running");

    wait_for_shutdown(&shutdown).await;

    scheduler.destroy().await;
    control::publish_shutdown(publisher.as_ref()).await;
    info!("Worker stopped");
    Ok(())
}

async fn wait_for_shutdown(shutdown: &Notify) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for interrupt");
            }
            info!("Interrupt received");
        }
        _ = terminate() => info!("Terminate received"),
        _ = shutdown.notified() => warn!("Shutting down after critical error"),
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sig) => {
            sig.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

fn pick_config_path(arg: Option<String>) -> PathBuf {
    match arg {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from("res/config.toml"),
    }
}
