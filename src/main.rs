use anyhow::Result;
use log::{info, warn};
use review_dispatch::ack::AckConsumer;
use review_dispatch::cache::{CacheService, SessionRepository};
use review_dispatch::config;
use review_dispatch::db::DatabaseService;
use review_dispatch::engine::AssignmentEngine;
use review_dispatch::ingest::IngestConsumer;
use review_dispatch::jobs::{CounterResyncJob, ExpiredAssignmentSweep, InactiveReviewerSweep};
use review_dispatch::messaging;
use review_dispatch::relay::OutboxRelay;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn run_app() -> Result<()> {
    env_logger::init();
    info!("Starting review dispatch service");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;
    info!("Configuration loaded");

    // Startup failures here are fatal; everything after this point retries
    let database = DatabaseService::new(&config.database).await?;
    let cache = CacheService::new(&config.cache).await?;
    let broker = messaging::create_message_broker(config.message_broker.clone()).await?;
    info!("Message broker initialized");

    let sessions = SessionRepository::new(cache.pool.clone(), config.assignment.session_ttl_secs);

    let engine = Arc::new(AssignmentEngine::new(
        database.pool.clone(),
        sessions.clone(),
        config.assignment.clone(),
    ));

    let shutdown = CancellationToken::new();
    let mut workers = Vec::new();

    // Consumers
    let ingest = Arc::new(IngestConsumer::new(broker.clone(), engine.clone()));
    workers.push(ingest.start(shutdown.clone()));

    let ack = Arc::new(AckConsumer::new(broker.clone(), database.pool.clone()));
    workers.push(ack.start(shutdown.clone()));

    // Outbox relay
    let relay = Arc::new(OutboxRelay::new(
        config.relay.clone(),
        database.pool.clone(),
        broker.clone(),
    ));
    workers.push(relay.start(shutdown.clone()));

    // Reconciliation jobs
    let expired_sweep = Arc::new(ExpiredAssignmentSweep::new(
        database.pool.clone(),
        sessions.clone(),
        config.assignment.assignment_ttl_minutes,
        config.jobs.expired_sweep_interval_secs,
    ));
    workers.push(expired_sweep.start(shutdown.clone()));

    let inactive_sweep = Arc::new(InactiveReviewerSweep::new(
        database.pool.clone(),
        sessions.clone(),
        config.jobs.inactive_sweep_interval_secs,
    ));
    workers.push(inactive_sweep.start(shutdown.clone()));

    // First tick runs immediately, covering the startup resync
    let resync = Arc::new(CounterResyncJob::new(
        database.pool.clone(),
        sessions.clone(),
        config.jobs.resync_interval_secs,
    ));
    workers.push(resync.start(shutdown.clone()));

    info!("All workers started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // Stop taking new messages; unacked deliveries are requeued by the
    // broker when the channels close. Job timers exit immediately.
    shutdown.cancel();

    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Worker exited abnormally: {}", e);
        }
    }

    info!("Shutdown complete");

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
