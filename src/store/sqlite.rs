//! `SQLite`-backed state store

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

use super::{
    StateDefinition, StateHints, StateId, StateObject, StateStore, StateValue, StoredState, schema,
};
use crate::{Error, Result};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// State store persisted in a `SQLite` database
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (and migrate) the database at `path`
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened or initialized
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| Error::Store(e.to_string()))?;

        let conn = pool.get().map_err(|e| Error::Store(e.to_string()))?;
        schema::init(&conn)?;

        tracing::info!(
            path = %path.as_ref().display(),
            version = schema::SCHEMA_VERSION,
            "state database initialized"
        );
        Ok(Self { pool })
    }

    /// Open an in-memory database (for testing)
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be initialized
    pub fn open_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| Error::Store(e.to_string()))?;

        let conn = pool.get().map_err(|e| Error::Store(e.to_string()))?;
        schema::init(&conn)?;

        Ok(Self { pool })
    }

    /// Run a blocking query on the pool without stalling the runtime
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DbConn) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| Error::Store(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::Store(format!("store task failed: {e}")))?
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get_object(&self, id: &StateId) -> Result<Option<StateObject>> {
        let key = id.to_string();
        let id = id.clone();
        self.with_conn(move |conn| {
            let row: Option<(Option<String>, Option<String>)> = conn
                .query_row(
                    "SELECT common, native FROM states WHERE id = ?1",
                    [&key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((Some(common), Some(native))) = row else {
                return Ok(None);
            };
            Ok(Some(StateObject {
                id,
                common: serde_json::from_str(&common)?,
                native: serde_json::from_str(&native)?,
            }))
        })
        .await
    }

    async fn create_state(
        &self,
        id: &StateId,
        definition: &StateDefinition,
        hints: &StateHints,
    ) -> Result<()> {
        let id = id.clone();
        let common = serde_json::to_string(definition)?;
        let native = serde_json::to_string(hints)?;
        let def = definition.def;
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            // A row may already exist from a bare value write; only fill in the object
            conn.execute(
                "INSERT INTO states (id, device_id, channel, item, common, native, val, ack, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    common = COALESCE(states.common, excluded.common),
                    native = COALESCE(states.native, excluded.native)",
                params![
                    id.to_string(),
                    id.device,
                    id.channel,
                    id.item,
                    common,
                    native,
                    def,
                    now
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn set_state(&self, id: &StateId, value: StateValue) -> Result<()> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO states (id, device_id, channel, item, val, ack, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    val = excluded.val,
                    ack = excluded.ack,
                    ts = excluded.ts",
                params![
                    id.to_string(),
                    id.device,
                    id.channel,
                    id.item,
                    value.val,
                    value.ack,
                    now
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_state(&self, id: &StateId) -> Result<Option<StoredState>> {
        let key = id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT val, ack, ts FROM states WHERE id = ?1",
                    [&key],
                    |row| {
                        Ok(StoredState {
                            val: row.get(0)?,
                            ack: row.get(1)?,
                            ts: parse_datetime(&row.get::<_, String>(2)?),
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn get_devices(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM devices ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
        .await
    }

    async fn create_device(&self, id: &str, name: &str) -> Result<()> {
        let id = id.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO devices (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
                [&id, &name],
            )?;
            Ok(())
        })
        .await
    }

    async fn create_channel(&self, device: &str, channel: &str) -> Result<()> {
        let device = device.to_string();
        let channel = channel.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO channels (device_id, channel) VALUES (?1, ?2)
                 ON CONFLICT(device_id, channel) DO NOTHING",
                [&device, &channel],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_device(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM states WHERE device_id = ?1", [&id])?;
            tx.execute("DELETE FROM channels WHERE device_id = ?1", [&id])?;
            tx.execute("DELETE FROM devices WHERE id = ?1", [&id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

/// Parse an RFC 3339 timestamp, falling back to now
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints(url: &str) -> StateHints {
        StateHints { url: url.into() }
    }

    #[tokio::test]
    async fn object_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let id = StateId::new("Den", "keys", "Home");

        assert!(store.get_object(&id).await.unwrap().is_none());

        store
            .create_state(&id, &StateDefinition::indicator("Home"), &hints("keys/Home"))
            .await
            .unwrap();

        let object = store.get_object(&id).await.unwrap().unwrap();
        assert_eq!(object.common.role, "indicator.state");
        assert_eq!(object.native.url, "keys/Home");

        let state = store.get_state(&id).await.unwrap().unwrap();
        assert!(!state.val);
    }

    #[tokio::test]
    async fn create_is_idempotent_and_keeps_value() {
        let store = SqliteStore::open_memory().unwrap();
        let id = StateId::new("Den", "apps", "12");
        let def = StateDefinition::indicator("12");

        store.create_state(&id, &def, &hints("apps/12")).await.unwrap();
        store.set_state(&id, StateValue::acked(true)).await.unwrap();
        store.create_state(&id, &def, &hints("apps/12")).await.unwrap();

        let state = store.get_state(&id).await.unwrap().unwrap();
        assert!(state.val);
        assert!(state.ack);
    }

    #[tokio::test]
    async fn bare_value_write_has_no_object() {
        let store = SqliteStore::open_memory().unwrap();
        let id = StateId::new("Den", "keys", "Up");

        store.set_state(&id, StateValue::acked(true)).await.unwrap();
        assert!(store.get_object(&id).await.unwrap().is_none());

        store
            .create_state(&id, &StateDefinition::indicator("Up"), &hints("keys/Up"))
            .await
            .unwrap();
        assert!(store.get_object(&id).await.unwrap().is_some());
        assert!(store.get_state(&id).await.unwrap().unwrap().val);
    }

    #[tokio::test]
    async fn devices_and_cascade_delete() {
        let store = SqliteStore::open_memory().unwrap();
        store.create_device("Den", "Den").await.unwrap();
        store.create_device("Den", "Den").await.unwrap();
        store.create_channel("Den", "keys").await.unwrap();
        store.create_device("Hall", "Hall").await.unwrap();

        let id = StateId::new("Den", "keys", "Home");
        store.set_state(&id, StateValue::acked(true)).await.unwrap();

        assert_eq!(store.get_devices().await.unwrap(), ["Den", "Hall"]);

        store.delete_device("Den").await.unwrap();
        assert_eq!(store.get_devices().await.unwrap(), ["Hall"]);
        assert!(store.get_state(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states.db");
        let id = StateId::new("Den", "keys", "Home");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set_state(&id, StateValue::acked(true)).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get_state(&id).await.unwrap().unwrap().val);
    }
}
