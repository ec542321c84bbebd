use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use arrival_core::{Coordinate, WorkflowConfig, WorkflowStatus, DEFAULT_RADIUS_METERS};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::db::init_db;
use crate::error::{Result, StoreError};

const KEY_BOT_TOKEN: &str = "bot_token";
const KEY_CHAT_ID: &str = "chat_id";
const KEY_MESSAGE: &str = "message";
const KEY_DESTINATION_LAT: &str = "destination_lat";
const KEY_DESTINATION_LNG: &str = "destination_lng";
const KEY_RADIUS: &str = "radius";
const KEY_IS_ACTIVE: &str = "is_active";
const KEY_WORKFLOW_STATUS: &str = "workflow_status";

const UPSERT: &str = "INSERT INTO workflow_kv (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// Durable key/value persistence of the workflow configuration and status.
///
/// Thread-safe: wraps a single SQLite connection in a `Mutex`. One monitor
/// per process is the supported model, so no cross-process locking is done.
pub struct WorkflowStore {
    db: Mutex<Connection>,
}

impl WorkflowStore {
    /// Wrap an already-open connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "opening workflow store");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::new(conn)
    }

    /// Fresh store backed by an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Return the persisted configuration, falling back to defaults for
    /// keys that were never written.
    #[instrument(skip(self))]
    pub fn load(&self) -> Result<WorkflowConfig> {
        let values = self.read_all()?;
        let text = |key: &str| values.get(key).cloned().unwrap_or_default();

        let cfg = WorkflowConfig {
            endpoint_credential: text(KEY_BOT_TOKEN),
            target_channel: text(KEY_CHAT_ID),
            message_body: text(KEY_MESSAGE),
            destination: Coordinate::new(
                parse_or(&values, KEY_DESTINATION_LAT, 0.0)?,
                parse_or(&values, KEY_DESTINATION_LNG, 0.0)?,
            ),
            radius_meters: parse_or(&values, KEY_RADIUS, DEFAULT_RADIUS_METERS)?,
            active: parse_or(&values, KEY_IS_ACTIVE, false)?,
        };
        debug!(active = cfg.active, radius = cfg.radius_meters, "workflow config loaded");
        Ok(cfg)
    }

    /// Persist every configuration field in a single transaction.
    #[instrument(skip(self, cfg), fields(active = cfg.active))]
    pub fn save(&self, cfg: &WorkflowConfig) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let fields = [
            (KEY_BOT_TOKEN, cfg.endpoint_credential.clone()),
            (KEY_CHAT_ID, cfg.target_channel.clone()),
            (KEY_MESSAGE, cfg.message_body.clone()),
            (KEY_DESTINATION_LAT, cfg.destination.latitude.to_string()),
            (KEY_DESTINATION_LNG, cfg.destination.longitude.to_string()),
            (KEY_RADIUS, cfg.radius_meters.to_string()),
            (KEY_IS_ACTIVE, cfg.active.to_string()),
        ];

        let mut db = self.lock();
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT)?;
            for (key, value) in &fields {
                stmt.execute(rusqlite::params![key, value, now])?;
            }
        }
        tx.commit()?;
        debug!("workflow config saved");
        Ok(())
    }

    /// Flip only the `active` flag, leaving the rest of the config untouched.
    pub fn set_active(&self, active: bool) -> Result<()> {
        self.put(KEY_IS_ACTIVE, &active.to_string())
    }

    /// Persisted status; `Inactive` when never written or unparsable.
    pub fn status(&self) -> Result<WorkflowStatus> {
        let raw: Option<String> = {
            let db = self.lock();
            match db.query_row(
                "SELECT value FROM workflow_kv WHERE key = ?1",
                [KEY_WORKFLOW_STATUS],
                |row| row.get(0),
            ) {
                Ok(v) => Some(v),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(StoreError::Database(e)),
            }
        };

        Ok(match raw {
            None => WorkflowStatus::Inactive,
            Some(s) => s.parse().unwrap_or_else(|e| {
                warn!(value = %s, error = %e, "unreadable workflow status, treating as inactive");
                WorkflowStatus::Inactive
            }),
        })
    }

    pub fn set_status(&self, status: WorkflowStatus) -> Result<()> {
        self.put(KEY_WORKFLOW_STATUS, &status.to_string())?;
        info!(%status, "workflow status persisted");
        Ok(())
    }

    /// Remove every key; subsequent reads return defaults.
    pub fn clear(&self) -> Result<()> {
        let n = self.lock().execute("DELETE FROM workflow_kv", [])?;
        info!(keys = n, "workflow store cleared");
        Ok(())
    }

    // --- private helpers ---------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite half-written.
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.lock().execute(UPSERT, rusqlite::params![key, value, now])?;
        Ok(())
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        let db = self.lock();
        let mut stmt = db.prepare_cached("SELECT key, value FROM workflow_kv")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut values = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            values.insert(key, value);
        }
        Ok(values)
    }
}

fn parse_or<T: std::str::FromStr>(
    values: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T> {
    match values.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            value: raw.clone(),
        }),
    }
}
