use crate::cache::SessionRepository;
use crate::db::repositories::{AssignmentsRepository, DedupRepository};
use crate::error::Error;
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use log::{error, info, warn};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

/// Expired-assignment sweep: soft-deletes pending assignments older than the
/// configured TTL, deletes their dedup markers so the events can be assigned
/// again, and rewrites each affected reviewer's cached counter from the
/// ledger.
pub struct ExpiredAssignmentSweep {
    pool: Arc<PgPool>,
    assignments: AssignmentsRepository,
    dedup: DedupRepository,
    sessions: SessionRepository,
    ttl_minutes: i64,
    interval_secs: u64,
}

impl ExpiredAssignmentSweep {
    pub fn new(
        pool: Arc<PgPool>,
        sessions: SessionRepository,
        ttl_minutes: i64,
        interval_secs: u64,
    ) -> Self {
        Self {
            assignments: AssignmentsRepository::new(pool.clone()),
            dedup: DedupRepository::new(pool.clone()),
            pool,
            sessions,
            ttl_minutes,
            interval_secs,
        }
    }

    /// Spawn the sweep on its timer
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Expired-assignment sweep started (ttl {} minutes, every {} seconds)",
                self.ttl_minutes, self.interval_secs
            );

            let mut tick = interval(Duration::from_secs(self.interval_secs));

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = self.run_sweep().await {
                            error!("Error running expired-assignment sweep: {}", e);
                        }
                    }
                }
            }

            info!("Expired-assignment sweep shut down");
        })
    }

    /// One full sweep pass. Each reviewer's batch runs in its own short
    /// transaction; a failure on one reviewer is logged and the sweep moves
    /// on.
    pub async fn run_sweep(&self) -> Result<()> {
        let cutoff = Utc::now() - ChronoDuration::minutes(self.ttl_minutes);
        let expired = self.assignments.expired_pending(cutoff).await?;

        if expired.is_empty() {
            return Ok(());
        }

        info!("Found {} expired assignments", expired.len());

        let grouped =
            super::group_by_reviewer(expired.iter().map(|a| (a.reviewer_id, a.assignment_id)));

        for (reviewer_id, batch) in grouped {
            if let Err(e) = self.expire_reviewer_batch(reviewer_id, &batch).await {
                warn!(
                    "Failed to expire assignments for reviewer {}: {}",
                    reviewer_id, e
                );
                continue;
            }

            self.resync_reviewer_counter(reviewer_id).await;
        }

        Ok(())
    }

    async fn expire_reviewer_batch(&self, reviewer_id: i64, assignment_ids: &[i64]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        // A reviewer may finish an assignment between the sweep's read and
        // this delete; only the assignments actually soft-deleted have their
        // events freed for reassignment.
        let freed = self
            .assignments
            .soft_delete_in_tx(&mut *tx, assignment_ids)
            .await?;
        if !freed.is_empty() {
            self.dedup.delete_many_in_tx(&mut *tx, &freed).await?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit expiry batch: {}", e)))?;

        info!(
            "Expired {} of {} assignments for reviewer {}",
            freed.len(),
            assignment_ids.len(),
            reviewer_id
        );

        Ok(())
    }

    async fn resync_reviewer_counter(&self, reviewer_id: i64) {
        match self.assignments.pending_count(reviewer_id).await {
            Ok(count) => {
                if let Err(e) = self.sessions.set_load(reviewer_id, count).await {
                    warn!(
                        "Failed to resync cached load for reviewer {}: {}",
                        reviewer_id, e
                    );
                }
            }
            Err(e) => warn!(
                "Failed to recount assignments for reviewer {}: {}",
                reviewer_id, e
            ),
        }
    }
}
