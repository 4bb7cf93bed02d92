//! Durable progress, local-first.
//!
//! Every save lands in the SQLite cache before anything else; the remote
//! upsert rides along opportunistically and its failures never reach the
//! session. Reads prefer a fresh cache row, fall back to the remote store,
//! and repopulate the cache from whatever wins last-write-wins.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};

use crate::collaborators::RemoteProgressSink;
use crate::db::CacheDb;
use crate::models::ProgressRecord;

/// How long a cached row is trusted without consulting the remote store.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct ProgressStore {
    cache: CacheDb,
    remote: Arc<dyn RemoteProgressSink>,
    ttl: chrono::Duration,
}

impl ProgressStore {
    pub fn new(cache: CacheDb, remote: Arc<dyn RemoteProgressSink>) -> Self {
        Self::with_ttl(cache, remote, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(cache: CacheDb, remote: Arc<dyn RemoteProgressSink>, ttl: Duration) -> Self {
        Self {
            cache,
            remote,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Persists a record. The local write must succeed; its failure is the
    /// caller's problem. The remote upsert is fire-and-forget.
    pub async fn save(&self, record: &ProgressRecord) -> Result<()> {
        self.cache.upsert_progress(record).await?;

        let remote = Arc::clone(&self.remote);
        let record = record.clone();
        tokio::spawn(async move {
            if let Err(err) = remote.upsert(&record).await {
                warn!(
                    "remote progress upsert failed for user {} story {}: {err:#}",
                    record.user_id, record.story_id
                );
            }
        });

        Ok(())
    }

    /// Loads the freshest record available. Order of preference: fresh cache
    /// row, remote row reconciled against the cache, stale cache row.
    pub async fn load(&self, user_id: &str, story_id: &str) -> Result<Option<ProgressRecord>> {
        let local = self.cache.get_progress(user_id, story_id).await?;

        if let Some(record) = &local {
            if Utc::now() - record.updated_at <= self.ttl {
                return Ok(local);
            }
        }

        match self.remote.get(user_id, story_id).await {
            Ok(Some(remote_record)) => {
                let newest = match &local {
                    Some(cached) if cached.is_newer_than(&remote_record) => cached.clone(),
                    _ => remote_record,
                };
                if let Err(err) = self.cache.upsert_progress(&newest).await {
                    warn!("failed to repopulate progress cache: {err:#}");
                }
                Ok(Some(newest))
            }
            Ok(None) => Ok(local),
            Err(err) => {
                info!(
                    "remote progress fetch failed, serving cached row for user {user_id} \
                     story {story_id}: {err:#}"
                );
                Ok(local)
            }
        }
    }
}
