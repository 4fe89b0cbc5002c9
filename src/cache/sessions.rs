use crate::error::Error;
use anyhow::Result;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Connection, Pool};
use log::warn;
use serde::{Deserialize, Serialize};

/// Permanent set of every reviewer id that has ever logged in. Survives
/// session expiry; members are only removed by the inactive-reviewer sweep.
const REGISTERED_SET: &str = "reviewers:registered";

const SESSION_PREFIX: &str = "reviewer:session:";

fn session_key(reviewer_id: i64) -> String {
    format!("{}{}", SESSION_PREFIX, reviewer_id)
}

/// Cache-resident reviewer session payload. The key's existence is what
/// makes a reviewer "active"; `assignments` is the advisory load counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerSession {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub assignments: i64,
}

/// An active reviewer and their current load, as seen by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerCandidate {
    pub reviewer_id: i64,
    pub load: i64,
}

/// Session repository over the cache. The cache is an accelerator: every
/// counter here can be recomputed from the ledger, and the resync job does
/// exactly that.
#[derive(Clone)]
pub struct SessionRepository {
    pool: Pool,
    session_ttl_secs: u64,
}

impl SessionRepository {
    pub fn new(pool: Pool, session_ttl_secs: u64) -> Self {
        Self {
            pool,
            session_ttl_secs,
        }
    }

    async fn conn(&self) -> Result<Connection> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| Error::Cache(format!("Failed to get cache connection: {}", e)))?;
        Ok(conn)
    }

    /// Every reviewer that has ever logged in, active or not
    pub async fn registered_reviewers(&self) -> Result<Vec<i64>> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn
            .smembers(REGISTERED_SET)
            .await
            .map_err(|e| Error::Cache(format!("Failed to read registered set: {}", e)))?;

        let mut reviewers = Vec::with_capacity(members.len());
        for member in members {
            match member.parse::<i64>() {
                Ok(id) => reviewers.push(id),
                Err(_) => warn!("Ignoring malformed registered reviewer id: {}", member),
            }
        }
        reviewers.sort_unstable();

        Ok(reviewers)
    }

    /// Whether the reviewer currently holds a live session
    pub async fn is_active(&self, reviewer_id: i64) -> Result<bool> {
        let mut conn = self.conn().await?;
        let exists: bool = conn
            .exists(session_key(reviewer_id))
            .await
            .map_err(|e| Error::Cache(format!("Failed to check session: {}", e)))?;
        Ok(exists)
    }

    /// Fetch the session payload, if the session is still live
    pub async fn get_session(&self, reviewer_id: i64) -> Result<Option<ReviewerSession>> {
        let mut conn = self.conn().await?;
        let data: Option<String> = conn
            .get(session_key(reviewer_id))
            .await
            .map_err(|e| Error::Cache(format!("Failed to get session: {}", e)))?;

        match data {
            Some(json) => {
                let session = serde_json::from_str(&json)
                    .map_err(|e| Error::Serialization(format!("Invalid session payload: {}", e)))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Registered reviewers that are backed by a live session, with their
    /// current load. Sessions that vanish or fail to parse mid-scan are
    /// skipped, not fatal.
    pub async fn list_active_candidates(&self) -> Result<Vec<ReviewerCandidate>> {
        let registered = self.registered_reviewers().await?;

        let mut candidates = Vec::new();
        for reviewer_id in registered {
            match self.get_session(reviewer_id).await {
                Ok(Some(session)) => candidates.push(ReviewerCandidate {
                    reviewer_id,
                    load: session.assignments,
                }),
                Ok(None) => {}
                Err(e) => warn!("Skipping reviewer {}: {}", reviewer_id, e),
            }
        }

        Ok(candidates)
    }

    /// Current cached load, zero when no session exists
    pub async fn get_load(&self, reviewer_id: i64) -> Result<i64> {
        Ok(self
            .get_session(reviewer_id)
            .await?
            .map(|s| s.assignments)
            .unwrap_or(0))
    }

    /// Best-effort counter bump after an assignment commit. Read-modify-write
    /// on the session JSON, keeping the session's remaining TTL.
    pub async fn incr_load(&self, reviewer_id: i64, delta: i64) -> Result<()> {
        let session = match self.get_session(reviewer_id).await? {
            Some(session) => session,
            None => {
                warn!(
                    "Reviewer {} has no live session while updating load",
                    reviewer_id
                );
                return Ok(());
            }
        };

        let updated = ReviewerSession {
            assignments: (session.assignments + delta).max(0),
            ..session
        };
        self.write_session_keep_ttl(reviewer_id, &updated).await
    }

    /// Overwrite the cached counter with the authoritative ledger count,
    /// preserving the session's remaining TTL.
    pub async fn set_load(&self, reviewer_id: i64, count: i64) -> Result<()> {
        let session = match self.get_session(reviewer_id).await? {
            Some(session) => session,
            None => return Ok(()),
        };

        let updated = ReviewerSession {
            assignments: count,
            ..session
        };
        self.write_session_keep_ttl(reviewer_id, &updated).await
    }

    async fn write_session_keep_ttl(
        &self,
        reviewer_id: i64,
        session: &ReviewerSession,
    ) -> Result<()> {
        let payload = serde_json::to_string(session)
            .map_err(|e| Error::Serialization(format!("Failed to encode session: {}", e)))?;

        let mut conn = self.conn().await?;
        redis::cmd("SET")
            .arg(session_key(reviewer_id))
            .arg(payload)
            .arg("KEEPTTL")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| Error::Cache(format!("Failed to write session: {}", e)))?;

        Ok(())
    }

    /// Create or replace the reviewer's session and record them in the
    /// permanent registered set. Called by the login glue, not the core.
    pub async fn create_session(&self, session: &ReviewerSession) -> Result<()> {
        let payload = serde_json::to_string(session)
            .map_err(|e| Error::Serialization(format!("Failed to encode session: {}", e)))?;

        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(session_key(session.id), payload, self.session_ttl_secs)
            .await
            .map_err(|e| Error::Cache(format!("Failed to create session: {}", e)))?;
        conn.sadd::<_, _, ()>(REGISTERED_SET, session.id.to_string())
            .await
            .map_err(|e| Error::Cache(format!("Failed to register reviewer: {}", e)))?;

        Ok(())
    }

    /// Delete the session key on logout. Registration is kept; only the
    /// inactive-reviewer sweep removes it.
    pub async fn remove_session(&self, reviewer_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(session_key(reviewer_id))
            .await
            .map_err(|e| Error::Cache(format!("Failed to remove session: {}", e)))?;
        Ok(())
    }

    /// Push the session TTL out again on reviewer activity
    pub async fn refresh_session(&self, reviewer_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        let refreshed: bool = redis::cmd("EXPIRE")
            .arg(session_key(reviewer_id))
            .arg(self.session_ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Cache(format!("Failed to refresh session: {}", e)))?;

        if !refreshed {
            warn!("Session for reviewer {} already expired", reviewer_id);
        }

        Ok(())
    }

    /// Drop a reviewer from the permanent registered set
    pub async fn remove_registered(&self, reviewer_id: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.srem::<_, _, ()>(REGISTERED_SET, reviewer_id.to_string())
            .await
            .map_err(|e| Error::Cache(format!("Failed to deregister reviewer: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_format() {
        assert_eq!(session_key(42), "reviewer:session:42");
    }

    #[test]
    fn session_payload_tolerates_missing_fields() {
        let session: ReviewerSession = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(session.id, 7);
        assert_eq!(session.assignments, 0);
        assert!(session.name.is_none());
    }

    #[test]
    fn session_payload_roundtrip() {
        let session = ReviewerSession {
            id: 3,
            name: Some("Dana".to_string()),
            role: Some("reviewer".to_string()),
            region: Some("EU".to_string()),
            assignments: 4,
        };
        let json = serde_json::to_string(&session).unwrap();
        let back: ReviewerSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.assignments, 4);
        assert_eq!(back.region.as_deref(), Some("EU"));
    }
}
