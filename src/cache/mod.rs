use crate::config::CacheConfig;
use crate::error::Error;
use anyhow::Result;
use deadpool_redis::redis;
use log::{error, info};

pub mod sessions;

#[cfg(test)]
mod tests;

pub use sessions::{ReviewerCandidate, ReviewerSession, SessionRepository};

/// Session cache (Redis) service holding the connection pool
pub struct CacheService {
    pub pool: deadpool_redis::Pool,
}

impl CacheService {
    /// Create a new cache service and verify connectivity
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        info!("Initializing session cache service");

        let mut cfg = deadpool_redis::Config::from_url(config.url.clone());
        cfg.pool = Some(deadpool_redis::PoolConfig::new(config.pool_size as usize));

        let pool = cfg
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| Error::Cache(format!("Failed to create cache pool: {}", e)))?;

        let service = Self { pool };

        // Fail fast at startup if the cache is unreachable
        let mut conn = service
            .pool
            .get()
            .await
            .map_err(|e| Error::Cache(format!("Failed to connect to cache: {}", e)))?;
        redis::cmd("PING")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| Error::Cache(format!("Cache ping failed: {}", e)))?;

        info!("Connected to session cache");

        Ok(service)
    }

    /// Health check for the cache
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Cache health check failed: {}", e);
                return Ok(false);
            }
        };

        match redis::cmd("PING").query_async::<_, ()>(&mut conn).await {
            Ok(_) => Ok(true),
            Err(e) => {
                error!("Cache health check failed: {}", e);
                Ok(false)
            }
        }
    }
}
