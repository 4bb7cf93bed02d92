//! Local progress cache on SQLite.
//!
//! All connection access happens on one dedicated worker thread; callers hand
//! it closures over an mpsc channel and await the reply on a oneshot. The
//! handle is cheap to clone and safe to share across sessions; records are
//! keyed per `(user_id, story_id)`, so concurrent sessions for different
//! stories do not contend on rows.

use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

mod migrations;

use crate::models::ProgressRecord;
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct CacheDbInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for CacheDbInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to cache DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join cache DB thread: {join_err:?}");
            }
        }
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("value {value} is negative"))
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

/// Handle to the progress cache database.
#[derive(Clone)]
pub struct CacheDb {
    inner: Arc<CacheDbInner>,
    db_path: Arc<PathBuf>,
}

impl CacheDb {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache directory {}", parent.display()))?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("readalong-cache".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open progress cache database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run cache migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Cache DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Progress cache thread shutting down");
            })
            .with_context(|| "failed to spawn cache worker thread")?;

        ready_rx
            .recv()
            .context("cache worker exited before signaling readiness")??;

        info!("Progress cache initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(CacheDbInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Cache DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to cache thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("cache thread terminated unexpectedly"))?
    }

    pub async fn upsert_progress(&self, record: &ProgressRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO progress_records (user_id, story_id, words_read, accuracy, completed, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, story_id) DO UPDATE SET
                     words_read = excluded.words_read,
                     accuracy = excluded.accuracy,
                     completed = excluded.completed,
                     updated_at = excluded.updated_at",
                params![
                    record.user_id,
                    record.story_id,
                    to_i64(record.words_read)?,
                    record.accuracy,
                    record.completed,
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to upsert progress record")?;
            Ok(())
        })
        .await
    }

    pub async fn get_progress(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        let user_id = user_id.to_string();
        let story_id = story_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, story_id, words_read, accuracy, completed, updated_at
                 FROM progress_records
                 WHERE user_id = ?1 AND story_id = ?2",
            )?;

            let mut rows = stmt.query(params![user_id, story_id])?;
            if let Some(row) = rows.next()? {
                let record = ProgressRecord {
                    user_id: row.get::<_, String>(0)?,
                    story_id: row.get::<_, String>(1)?,
                    words_read: to_u64(row.get::<_, i64>(2)?)?,
                    accuracy: row.get::<_, f64>(3)?,
                    completed: row.get::<_, bool>(4)?,
                    updated_at: parse_datetime(&row.get::<_, String>(5)?)?,
                };
                Ok(Some(record))
            } else {
                Ok(None)
            }
        })
        .await
    }
}
