//! Storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use super::traits::{ConflictPolicy, EntityKind, Record};

/// Trait for durable storage backends.
///
/// All operations are synchronous and expected to complete quickly; callers
/// invoke them directly from async code.
pub trait Storage: Send + Sync + 'static {
  /// Write a batch of records atomically.
  ///
  /// Returns the keys that were actually written, in write order. Under
  /// [`ConflictPolicy::KeepFirst`] keys that already existed are skipped.
  fn upsert<T: Record>(&self, records: &[T]) -> Result<Vec<String>>;

  /// Get a single record by key.
  fn get<T: Record>(&self, key: &str) -> Result<Option<T>>;

  /// Get every record of a kind in write order.
  fn get_all<T: Record>(&self) -> Result<Vec<T>>;

  /// Add a topic. Returns false if it was already present.
  fn insert_topic(&self, topic: &str) -> Result<bool>;

  /// Remove a topic. Returns false if it was not present.
  fn remove_topic(&self, topic: &str) -> Result<bool>;

  fn has_topic(&self, topic: &str) -> Result<bool>;

  /// All subscribed topics in subscription order.
  fn topics(&self) -> Result<Vec<String>>;
}

/// SQLite-based storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) the store at the given path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory store. Nothing survives the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("vlr-sync").join("store.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    for kind in EntityKind::ALL {
      conn
        .execute_batch(&entity_table_schema(kind))
        .map_err(|e| eyre!("Failed to create {} table: {}", kind, e))?;
    }

    conn
      .execute_batch(TOPIC_SCHEMA)
      .map_err(|e| eyre!("Failed to create topics table: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// One table per entity kind, keyed by primary key. Rows keep their rowid
/// order, so a replaced record moves to the end of its table.
fn entity_table_schema(kind: EntityKind) -> String {
  format!(
    r#"
CREATE TABLE IF NOT EXISTS {table} (
    key TEXT PRIMARY KEY NOT NULL,
    data BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    table = kind.table()
  )
}

const TOPIC_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS topics (
    topic TEXT PRIMARY KEY NOT NULL,
    subscribed_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl Storage for SqliteStorage {
  fn upsert<T: Record>(&self, records: &[T]) -> Result<Vec<String>> {
    let kind = T::kind();

    // Serialize the whole batch before the transaction opens
    let rows = records
      .iter()
      .map(|record| {
        let data = serde_json::to_vec(record)
          .map_err(|e| eyre!("Failed to serialize {}: {}", kind, e))?;
        Ok((record.record_key(), data))
      })
      .collect::<Result<Vec<(String, Vec<u8>)>>>()?;

    let verb = match kind.policy() {
      ConflictPolicy::Replace => "INSERT OR REPLACE",
      ConflictPolicy::KeepFirst => "INSERT OR IGNORE",
    };
    let sql = format!(
      "{} INTO {} (key, data, stored_at) VALUES (?1, ?2, datetime('now'))",
      verb,
      kind.table()
    );

    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let mut written = Vec::with_capacity(rows.len());
    {
      let mut stmt = tx
        .prepare_cached(&sql)
        .map_err(|e| eyre!("Failed to prepare upsert: {}", e))?;

      for (key, data) in &rows {
        let changed = stmt
          .execute(params![key, data])
          .map_err(|e| eyre!("Failed to store {} {}: {}", kind, key, e))?;
        if changed > 0 {
          written.push(key.clone());
        }
      }
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(written)
  }

  fn get<T: Record>(&self, key: &str) -> Result<Option<T>> {
    let kind = T::kind();
    let conn = self.lock()?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        &format!("SELECT data FROM {} WHERE key = ?1", kind.table()),
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {} {}: {}", kind, key, e))?;

    match data {
      Some(data) => {
        let record = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize {} {}: {}", kind, key, e))?;
        Ok(Some(record))
      }
      None => Ok(None),
    }
  }

  fn get_all<T: Record>(&self) -> Result<Vec<T>> {
    let kind = T::kind();
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare_cached(&format!(
        "SELECT key, data FROM {} ORDER BY rowid",
        kind.table()
      ))
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
      })
      .map_err(|e| eyre!("Failed to query {}: {}", kind, e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read {} rows: {}", kind, e))?;

    // Rows from an older schema are skipped
    let records = rows
      .into_iter()
      .filter_map(|(key, data)| match serde_json::from_slice(&data) {
        Ok(record) => Some(record),
        Err(e) => {
          warn!(%kind, %key, error = %e, "skipping undecodable record");
          None
        }
      })
      .collect();

    Ok(records)
  }

  fn insert_topic(&self, topic: &str) -> Result<bool> {
    let conn = self.lock()?;
    let changed = conn
      .execute(
        "INSERT OR IGNORE INTO topics (topic, subscribed_at) VALUES (?1, datetime('now'))",
        params![topic],
      )
      .map_err(|e| eyre!("Failed to store topic {}: {}", topic, e))?;
    Ok(changed > 0)
  }

  fn remove_topic(&self, topic: &str) -> Result<bool> {
    let conn = self.lock()?;
    let changed = conn
      .execute("DELETE FROM topics WHERE topic = ?1", params![topic])
      .map_err(|e| eyre!("Failed to remove topic {}: {}", topic, e))?;
    Ok(changed > 0)
  }

  fn has_topic(&self, topic: &str) -> Result<bool> {
    let conn = self.lock()?;
    let found: Option<i64> = conn
      .query_row(
        "SELECT 1 FROM topics WHERE topic = ?1",
        params![topic],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read topic {}: {}", topic, e))?;
    Ok(found.is_some())
  }

  fn topics(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare_cached("SELECT topic FROM topics ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let topics = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query topics: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read topics: {}", e))?;

    Ok(topics)
  }
}
