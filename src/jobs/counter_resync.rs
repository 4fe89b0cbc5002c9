use crate::cache::SessionRepository;
use crate::db::repositories::AssignmentsRepository;
use anyhow::Result;
use log::{error, info, warn};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

/// Full counter resync: overwrites every live session's cached load with the
/// ledger's pending count. The consistency backstop for everything the
/// best-effort counter updates may have missed; runs at startup and on a
/// long interval.
pub struct CounterResyncJob {
    assignments: AssignmentsRepository,
    sessions: SessionRepository,
    interval_secs: u64,
}

impl CounterResyncJob {
    pub fn new(pool: Arc<PgPool>, sessions: SessionRepository, interval_secs: u64) -> Self {
        Self {
            assignments: AssignmentsRepository::new(pool),
            sessions,
            interval_secs,
        }
    }

    /// Spawn the resync on its timer. The first tick fires immediately, which
    /// covers the startup resync.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Counter resync started (every {} seconds)",
                self.interval_secs
            );

            let mut tick = interval(Duration::from_secs(self.interval_secs));

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = self.run_resync().await {
                            error!("Error running counter resync: {}", e);
                        }
                    }
                }
            }

            info!("Counter resync shut down");
        })
    }

    /// Recompute every active reviewer's counter from the ledger
    pub async fn run_resync(&self) -> Result<()> {
        let registered = self.sessions.registered_reviewers().await?;

        let mut synced = 0usize;
        for reviewer_id in registered {
            if !self.sessions.is_active(reviewer_id).await? {
                continue;
            }

            match self.assignments.pending_count(reviewer_id).await {
                Ok(count) => {
                    if let Err(e) = self.sessions.set_load(reviewer_id, count).await {
                        warn!(
                            "Failed to write resynced load for reviewer {}: {}",
                            reviewer_id, e
                        );
                        continue;
                    }
                    synced += 1;
                }
                Err(e) => warn!(
                    "Failed to recount assignments for reviewer {}: {}",
                    reviewer_id, e
                ),
            }
        }

        if synced > 0 {
            info!("Resynced cached counters for {} reviewers", synced);
        }

        Ok(())
    }
}
