//! Rate-limit records keyed by `(recipient, channel)`.
//!
//! `try_acquire` is a single check-then-record step, so two plans running at
//! once can never both treat the same pair as unthrottled.  A reservation is
//! rolled back with `release` when the delivery it guarded fails.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlite::State;
use tracing::{debug, info, warn};

use crate::Result;

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The pair is now recorded as sent at `now`.  `previous` is what the
    /// record held before, for [`RateLimitStore::release`].
    Granted { previous: Option<i64> },
    Limited { retry_after: Duration },
}

pub trait RateLimitStore: Send + Sync {
    /// Record `now` for the pair unless the last send is within `window`.
    fn try_acquire(
        &self,
        recipient_id: &str,
        channel_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Acquire>;

    /// Undo a grant: restore `previous` if the record still holds
    /// `reserved_at`.  A newer send is left alone.
    fn release(
        &self,
        recipient_id: &str,
        channel_id: &str,
        reserved_at: DateTime<Utc>,
        previous: Option<i64>,
    ) -> Result<()>;

    /// Last recorded send, as Unix milliseconds.
    fn last_sent(&self, recipient_id: &str, channel_id: &str) -> Result<Option<i64>>;
}

fn window_ms(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

/// `Some(retry_after)` while `last` is still inside the window.
fn remaining(last: Option<i64>, window: Duration, now_ms: i64) -> Option<Duration> {
    let last = last?;
    let until = last.saturating_add(window_ms(window));
    (now_ms < until).then(|| Duration::from_millis(until.saturating_sub(now_ms).unsigned_abs()))
}

// ───────────────────────────── In-memory ─────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryRateLimits {
    records: Mutex<HashMap<(String, String), i64>>,
}

impl MemoryRateLimits {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryRateLimits {
    fn try_acquire(
        &self,
        recipient_id: &str,
        channel_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Acquire> {
        let now_ms = now.timestamp_millis();
        let key = (recipient_id.to_string(), channel_id.to_string());
        let mut records = self.records.lock();

        let previous = records.get(&key).copied();
        if let Some(retry_after) = remaining(previous, window, now_ms) {
            return Ok(Acquire::Limited { retry_after });
        }
        records.insert(key, now_ms);
        Ok(Acquire::Granted { previous })
    }

    fn release(
        &self,
        recipient_id: &str,
        channel_id: &str,
        reserved_at: DateTime<Utc>,
        previous: Option<i64>,
    ) -> Result<()> {
        let key = (recipient_id.to_string(), channel_id.to_string());
        let mut records = self.records.lock();
        if records.get(&key) != Some(&reserved_at.timestamp_millis()) {
            return Ok(());
        }
        match previous {
            Some(ms) => records.insert(key, ms),
            None => records.remove(&key),
        };
        Ok(())
    }

    fn last_sent(&self, recipient_id: &str, channel_id: &str) -> Result<Option<i64>> {
        let key = (recipient_id.to_string(), channel_id.to_string());
        Ok(self.records.lock().get(&key).copied())
    }
}

// ───────────────────────────── SQLite ────────────────────────────────────

/// Rate-limit table in a SQLite file, shareable across processes.
pub struct SqliteRateLimits {
    conn: Mutex<sqlite::Connection>,
    path: PathBuf,
}

impl SqliteRateLimits {
    /// Open (or create) the database and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = sqlite::open(&path)?;
        conn.execute(
            "PRAGMA busy_timeout = 5000;
             CREATE TABLE IF NOT EXISTS rate_limits (
                recipient_id TEXT    NOT NULL,
                channel_id   TEXT    NOT NULL,
                last_sent_ms INTEGER NOT NULL,
                PRIMARY KEY (recipient_id, channel_id)
             );",
        )?;
        info!("Rate-limit DB opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside `BEGIN IMMEDIATE`, which takes the write lock up
    /// front so the read-modify-write cannot interleave with another
    /// process.
    fn immediate<T>(&self, f: impl FnOnce(&sqlite::Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE")?;
        match f(&conn) {
            Ok(v) => {
                conn.execute("COMMIT")?;
                Ok(v)
            }
            Err(e) => {
                if let Err(rollback) = conn.execute("ROLLBACK") {
                    warn!("Rate-limit rollback failed: {rollback}");
                }
                Err(e)
            }
        }
    }
}

fn read_last(conn: &sqlite::Connection, recipient_id: &str, channel_id: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare(
        "SELECT last_sent_ms FROM rate_limits WHERE recipient_id = ? AND channel_id = ?",
    )?;
    stmt.bind((1, recipient_id))?;
    stmt.bind((2, channel_id))?;
    match stmt.next()? {
        State::Row => Ok(Some(stmt.read::<i64, _>(0)?)),
        State::Done => Ok(None),
    }
}

fn write_last(conn: &sqlite::Connection, recipient_id: &str, channel_id: &str, ms: i64) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO rate_limits (recipient_id, channel_id, last_sent_ms) VALUES (?, ?, ?)
         ON CONFLICT (recipient_id, channel_id) DO UPDATE SET last_sent_ms = excluded.last_sent_ms",
    )?;
    stmt.bind((1, recipient_id))?;
    stmt.bind((2, channel_id))?;
    stmt.bind((3, ms))?;
    stmt.next()?;
    Ok(())
}

fn delete_last(conn: &sqlite::Connection, recipient_id: &str, channel_id: &str) -> Result<()> {
    let mut stmt =
        conn.prepare("DELETE FROM rate_limits WHERE recipient_id = ? AND channel_id = ?")?;
    stmt.bind((1, recipient_id))?;
    stmt.bind((2, channel_id))?;
    stmt.next()?;
    Ok(())
}

impl RateLimitStore for SqliteRateLimits {
    fn try_acquire(
        &self,
        recipient_id: &str,
        channel_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Acquire> {
        let now_ms = now.timestamp_millis();
        self.immediate(|conn| {
            let previous = read_last(conn, recipient_id, channel_id)?;
            if let Some(retry_after) = remaining(previous, window, now_ms) {
                return Ok(Acquire::Limited { retry_after });
            }
            write_last(conn, recipient_id, channel_id, now_ms)?;
            Ok(Acquire::Granted { previous })
        })
    }

    fn release(
        &self,
        recipient_id: &str,
        channel_id: &str,
        reserved_at: DateTime<Utc>,
        previous: Option<i64>,
    ) -> Result<()> {
        let reserved_ms = reserved_at.timestamp_millis();
        self.immediate(|conn| {
            if read_last(conn, recipient_id, channel_id)? != Some(reserved_ms) {
                debug!("Rate-limit record for {recipient_id}/{channel_id} moved on; keeping it");
                return Ok(());
            }
            match previous {
                Some(ms) => write_last(conn, recipient_id, channel_id, ms),
                None => delete_last(conn, recipient_id, channel_id),
            }
        })
    }

    fn last_sent(&self, recipient_id: &str, channel_id: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        read_last(&conn, recipient_id, channel_id)
    }
}
