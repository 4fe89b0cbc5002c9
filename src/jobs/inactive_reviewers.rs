use crate::cache::SessionRepository;
use crate::db::repositories::{AssignmentsRepository, DedupRepository};
use crate::error::Error;
use anyhow::Result;
use log::{error, info, warn};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

/// Inactive-reviewer sweep: reviewers in the permanent registered set whose
/// session has expired have all their pending assignments soft-deleted and
/// the matching dedup markers removed, then lose their registration. A
/// disconnected reviewer cannot hold events hostage.
pub struct InactiveReviewerSweep {
    pool: Arc<PgPool>,
    assignments: AssignmentsRepository,
    dedup: DedupRepository,
    sessions: SessionRepository,
    interval_secs: u64,
}

impl InactiveReviewerSweep {
    pub fn new(pool: Arc<PgPool>, sessions: SessionRepository, interval_secs: u64) -> Self {
        Self {
            assignments: AssignmentsRepository::new(pool.clone()),
            dedup: DedupRepository::new(pool.clone()),
            pool,
            sessions,
            interval_secs,
        }
    }

    /// Spawn the sweep on its timer
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Inactive-reviewer sweep started (every {} seconds)",
                self.interval_secs
            );

            let mut tick = interval(Duration::from_secs(self.interval_secs));

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = self.run_sweep().await {
                            error!("Error running inactive-reviewer sweep: {}", e);
                        }
                    }
                }
            }

            info!("Inactive-reviewer sweep shut down");
        })
    }

    /// One full sweep pass, per-reviewer transactions, log-and-continue
    pub async fn run_sweep(&self) -> Result<()> {
        let registered = self.sessions.registered_reviewers().await?;

        let mut inactive = Vec::new();
        for reviewer_id in registered {
            if !self.sessions.is_active(reviewer_id).await? {
                inactive.push(reviewer_id);
            }
        }

        if inactive.is_empty() {
            return Ok(());
        }

        info!("Found {} inactive reviewers", inactive.len());

        for reviewer_id in inactive {
            if let Err(e) = self.release_reviewer(reviewer_id).await {
                warn!("Failed to release reviewer {}: {}", reviewer_id, e);
            }
        }

        Ok(())
    }

    /// Soft-delete everything the reviewer still holds, then drop them from
    /// the registered set. Removal happens even when they hold nothing.
    async fn release_reviewer(&self, reviewer_id: i64) -> Result<()> {
        let pending = self.assignments.pending_for_reviewer(reviewer_id).await?;

        if !pending.is_empty() {
            let assignment_ids: Vec<i64> = pending.iter().map(|a| a.assignment_id).collect();

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

            // Only dedup markers of assignments actually soft-deleted are
            // removed; one finished concurrently keeps its marker.
            let freed = self
                .assignments
                .soft_delete_in_tx(&mut *tx, &assignment_ids)
                .await?;
            if !freed.is_empty() {
                self.dedup.delete_many_in_tx(&mut *tx, &freed).await?;
            }

            tx.commit()
                .await
                .map_err(|e| Error::Database(format!("Failed to commit release batch: {}", e)))?;

            info!(
                "Released {} pending assignments from inactive reviewer {}",
                freed.len(),
                reviewer_id
            );
        }

        self.sessions.remove_registered(reviewer_id).await?;
        info!("Removed inactive reviewer {} from registered set", reviewer_id);

        Ok(())
    }
}
