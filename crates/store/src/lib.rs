//! Durable history and replay.
//!
//! A thin bucketed keyspace over SQLite: one logical bucket per channel for
//! message history (`"<channelID>_log"`) plus fixed buckets for users,
//! channels, and per-channel read markers. Keys are 19-character timestamp
//! prefixes, so the B-tree's lexicographic order is chronological order and
//! replay is a range scan.

pub mod error;

use std::path::Path;

use {
    chrono::{DateTime, Utc},
    serde::{Serialize, de::DeserializeOwned},
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::{debug, warn},
};

use chatloom_bridge::{Channel, Command, Comms, Message, ORIGIN_DISK, User, key_prefix, zero_time};

pub use error::{Error, Result};
use error::Context as _;

/// Fixed bucket names.
pub const BUCKET_USERS: &str = "users";
pub const BUCKET_CHANNELS: &str = "channels";
pub const BUCKET_READ_STATUS: &str = "read_status";

/// Window size for a `replay_messages` command with a zero offset.
const DEFAULT_REPLAY_LIMIT: usize = 100;

/// Time bounds for a replay query. At most one side is non-zero in
/// typical use.
#[derive(Debug, Clone, Copy)]
pub struct Offset {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Default for Offset {
    fn default() -> Self {
        Self {
            from: zero_time(),
            to: zero_time(),
        }
    }
}

impl Offset {
    #[must_use]
    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn until(to: DateTime<Utc>) -> Self {
        Self {
            to,
            ..Self::default()
        }
    }
}

/// The persistence engine. Owns the only handle to the embedded store;
/// every read and write funnels through here.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the store at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create data dir {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::init(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory store, used by tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:").await?;
        Self::init(&pool).await?;
        Ok(Self { pool })
    }

    async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS buckets (
                bucket TEXT NOT NULL,
                key    TEXT NOT NULL,
                value  TEXT NOT NULL,
                PRIMARY KEY (bucket, key)
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Test-only access to the raw pool.
    #[doc(hidden)]
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ── Primitives ──────────────────────────────────────────────────────────

    /// Append one message to its channel's log bucket. The bucket springs
    /// into existence on first write; the last write wins on key collision.
    pub async fn append_log(&self, msg: &Message) -> Result<()> {
        self.put_kv(&log_bucket(&msg.channel_id()), &msg.key(), msg)
            .await
    }

    /// Upsert a JSON-encoded value.
    pub async fn put_kv<T: Serialize>(&self, bucket: &str, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO buckets (bucket, key, value) VALUES (?, ?, ?)
             ON CONFLICT (bucket, key) DO UPDATE SET value = excluded.value",
        )
        .bind(bucket)
        .bind(key)
        .bind(encoded)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read a single entry; [`Error::NotFound`] when the bucket or key is
    /// absent.
    pub async fn get_kv<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<T> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT value FROM buckets WHERE bucket = ? AND key = ?",
        )
        .bind(bucket)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(value) => Ok(serde_json::from_str(&value)?),
            None => Err(Error::not_found(bucket, key)),
        }
    }

    /// All decodable entries of a bucket in ascending key order. A missing
    /// bucket scans as empty; a record that fails to decode is logged and
    /// skipped, never aborting the scan.
    pub async fn scan<T: DeserializeOwned>(&self, bucket: &str) -> Result<Vec<T>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM buckets WHERE bucket = ? ORDER BY key ASC",
        )
        .bind(bucket)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            match serde_json::from_str(&value) {
                Ok(decoded) => entries.push(decoded),
                Err(e) => warn!(bucket, key, "skipping corrupt record: {e}"),
            }
        }
        Ok(entries)
    }

    // ── Replay ──────────────────────────────────────────────────────────────

    /// Time-bounded replay cursor over one channel's log.
    ///
    /// A non-zero `from` yields everything strictly after it, ascending.
    /// Otherwise the newest `limit` entries strictly before `to` are
    /// returned, still ascending, so the element closest to the bound sits
    /// at the tail.
    pub async fn replay(
        &self,
        channel_id: &str,
        offset: Offset,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let bucket = log_bucket(channel_id);

        let rows = if offset.from != zero_time() {
            sqlx::query_as::<_, (String, String)>(
                "SELECT key, value FROM buckets
                 WHERE bucket = ? AND key > ?
                 ORDER BY key ASC",
            )
            .bind(&bucket)
            .bind(key_prefix(offset.from))
            .fetch_all(&self.pool)
            .await?
        } else {
            let mut rows = sqlx::query_as::<_, (String, String)>(
                "SELECT key, value FROM buckets
                 WHERE bucket = ? AND key < ?
                 ORDER BY key DESC
                 LIMIT ?",
            )
            .bind(&bucket)
            .bind(key_prefix(offset.to))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
            rows.reverse();
            rows
        };

        let mut messages = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            match serde_json::from_str(&value) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!(bucket, key, "skipping corrupt record: {e}"),
            }
        }
        Ok(messages)
    }

    // ── Read markers ────────────────────────────────────────────────────────

    /// Persist `msg` as its channel's read marker. Zero-timestamp markers
    /// are ignored.
    pub async fn mark_read(&self, msg: &Message) -> Result<()> {
        if msg.has_zero_time() {
            return Ok(());
        }
        self.put_kv(BUCKET_READ_STATUS, &msg.channel_id(), msg).await
    }

    /// The stored read marker for a channel.
    pub async fn last_read(&self, channel_id: &str) -> Result<Message> {
        self.get_kv(BUCKET_READ_STATUS, channel_id).await
    }

    /// Number of logged messages strictly after the channel's read marker.
    /// With no marker every stored message counts as unread.
    pub async fn unread_count(&self, channel_id: &str) -> Result<u64> {
        let marker_key = match self.last_read(channel_id).await {
            Ok(marker) if !marker.has_zero_time() => Some(marker.key()),
            Ok(_) => None,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let bucket = log_bucket(channel_id);
        let count = match marker_key {
            Some(key) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM buckets WHERE bucket = ? AND key > ?",
                )
                .bind(&bucket)
                .bind(key)
                .fetch_one(&self.pool)
                .await?
            },
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM buckets WHERE bucket = ?")
                    .bind(&bucket)
                    .fetch_one(&self.pool)
                    .await?
            },
        };
        Ok(count.max(0) as u64)
    }

    // ── Command dispatch ────────────────────────────────────────────────────

    /// Resolve one client command against the store, pushing results onto
    /// the replay and read-status streams. Errors are logged here; nothing
    /// propagates to the event loop.
    pub async fn handle_command(&self, command: Command, comms: &Comms) {
        if let Err(e) = self.dispatch(&command, comms).await {
            warn!(?command, "command failed: {e}");
        }
    }

    async fn dispatch(&self, command: &Command, comms: &Comms) -> Result<()> {
        match command {
            Command::ReplayMessages { channel, offset } => {
                let (bounds, limit) = if *offset == zero_time() {
                    (Offset::until(Utc::now()), DEFAULT_REPLAY_LIMIT)
                } else {
                    (Offset::since(*offset), usize::MAX)
                };
                let messages = self.replay(channel, bounds, limit).await?;
                debug!(channel, count = messages.len(), "replaying history");
                for msg in messages {
                    comms.publish_log_message(msg).await;
                }
            },
            Command::GetUsers => {
                for mut user in self.scan::<User>(BUCKET_USERS).await? {
                    user.origin = ORIGIN_DISK.into();
                    comms.publish_user(user).await;
                }
            },
            Command::GetChannels => {
                for mut channel in self.scan::<Channel>(BUCKET_CHANNELS).await? {
                    channel.origin = ORIGIN_DISK.into();
                    comms.publish_channel(channel).await;
                }
            },
            Command::MarkMessageAsRead { message } => {
                self.mark_read(message).await?;
            },
            Command::GetLastReadMessage { channel } => {
                match self.last_read(channel).await {
                    Ok(marker) => comms.publish_read_status(marker).await,
                    Err(e) if e.is_not_found() => {},
                    Err(e) => return Err(e),
                }
            },
            Command::GetLastReadMessages => {
                for marker in self.scan::<Message>(BUCKET_READ_STATUS).await? {
                    comms.publish_read_status(marker).await;
                }
            },
        }
        Ok(())
    }
}

fn log_bucket(channel_id: &str) -> String {
    format!("{channel_id}_log")
}
