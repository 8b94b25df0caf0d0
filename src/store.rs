use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub const KEY_USER: &str = "user";
pub const KEY_APPLICATIONS: &str = "applications";
pub const KEY_REVIEWS: &str = "reviews";

/// Version tag written into every blob envelope.
pub const SCHEMA_VERSION: u64 = 1;

/// Raw key/value persistence. Values are opaque JSON text; shape checks
/// happen in [`LocalStore`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

// --- SQLite backend ---

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("store connection lock poisoned"))
    }

    fn get_blocking(&self, key: &str) -> Result<Option<String>> {
        self.conn()?
            .query_row("SELECT value FROM blobs WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to read '{}'", key))
    }

    fn put_blocking(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_blocking(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM blobs WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_blocking(key)
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_blocking(key, value)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_blocking(key)
    }
}


// --- Typed access ---

/// A decoded list plus the stored records that did not decode. Saving it
/// back keeps those records untouched.
#[derive(Debug)]
pub struct ListSnapshot<T> {
    pub items: Vec<T>,
    rejected: Vec<Value>,
}

impl<T> Default for ListSnapshot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> ListSnapshot<T> {
    /// Ids of the records that did not decode, where they have one.
    pub fn rejected_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.rejected
            .iter()
            .filter_map(|entry| entry.get("id").and_then(Value::as_i64))
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: ?Sized> {
    version: u64,
    data: &'a T,
}

/// Typed, versioned view over a [`BlobStore`]. Cloning shares the backend.
///
/// Plain reads never fail: a missing key, unparsable JSON, an unknown schema
/// version or a backend error all come back as the empty default. Writes
/// replace the whole blob for a key, so read-modify-write goes through
/// [`LocalStore::load_list`] and [`LocalStore::save_list`].
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn BlobStore>,
}

impl LocalStore {
    pub fn new(backend: impl BlobStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    #[cfg(test)]
    pub fn with_backend(backend: Arc<dyn BlobStore>) -> Self {
        Self { backend }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(memory::MemoryStore::new())
    }

    /// Every record of a list that still decodes. Records that do not are
    /// skipped with a warning.
    pub async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.load_list(key).await {
            Ok(snapshot) => snapshot.items,
            Err(e) => {
                warn!(key, error = %e, "list unavailable, using empty default");
                Vec::new()
            }
        }
    }

    /// Reads a list for a read-modify-write. Unlike [`LocalStore::read_list`]
    /// this fails when saving back would destroy data: a backend read error
    /// or a blob from a newer schema.
    pub async fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<ListSnapshot<T>> {
        let raw = self
            .backend
            .get(key)
            .await
            .with_context(|| format!("Failed to read '{}'", key))?;
        let payload = match raw.map(|raw| open_blob(key, &raw)) {
            None | Some(Blob::Unreadable) => return Ok(ListSnapshot::default()),
            Some(Blob::Newer(version)) => {
                return Err(anyhow!(
                    "'{}' was written with schema version {}; refusing to overwrite it",
                    key,
                    version
                ));
            }
            Some(Blob::Payload(payload)) => payload,
        };

        let entries = match payload {
            Value::Array(entries) => entries,
            other => {
                warn!(key, kind = json_kind(&other), "expected a list, using empty default");
                return Ok(ListSnapshot::default());
            }
        };

        let mut snapshot = ListSnapshot::default();
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<T>(entry.clone()) {
                Ok(item) => snapshot.items.push(item),
                Err(e) => {
                    warn!(key, index, error = %e, "skipping record with unexpected shape");
                    snapshot.rejected.push(entry);
                }
            }
        }
        Ok(snapshot)
    }

    /// Writes a snapshot back. Records that failed to decode on load are
    /// kept, ahead of the decoded ones.
    pub async fn save_list<T: Serialize>(&self, key: &str, snapshot: &ListSnapshot<T>) -> Result<()> {
        let mut entries = snapshot.rejected.clone();
        for item in &snapshot.items {
            entries.push(
                serde_json::to_value(item).with_context(|| format!("Failed to encode '{}'", key))?,
            );
        }
        self.write_value(key, &entries).await
    }

    pub async fn read_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "store read failed, using empty default");
                return None;
            }
        };
        let payload = match open_blob(key, &raw) {
            Blob::Payload(payload) => payload,
            Blob::Unreadable | Blob::Newer(_) => return None,
        };
        match serde_json::from_value(payload) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "blob has unexpected shape, using empty default");
                None
            }
        }
    }

    #[cfg(test)]
    pub async fn write_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        self.write_value(key, items).await
    }

    pub async fn write_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(&Envelope {
            version: SCHEMA_VERSION,
            data: value,
        })
        .with_context(|| format!("Failed to encode '{}'", key))?;
        self.backend
            .put(key, &raw)
            .await
            .with_context(|| format!("Failed to write '{}'", key))
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.backend
            .remove(key)
            .await
            .with_context(|| format!("Failed to remove '{}'", key))
    }
}

enum Blob {
    Payload(Value),
    Newer(u64),
    Unreadable,
}

fn open_blob(key: &str, raw: &str) -> Blob {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "malformed blob, using empty default");
            return Blob::Unreadable;
        }
    };

    match split_envelope(value) {
        Ok((SCHEMA_VERSION, data)) => Blob::Payload(data),
        Ok((version, _)) => {
            warn!(key, version, "unsupported schema version, using empty default");
            Blob::Newer(version)
        }
        Err(legacy) => {
            debug!(key, "reading unversioned blob");
            Blob::Payload(legacy)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Splits `{"version": n, "data": ..}` into its parts. Anything else is
/// handed back untouched as a legacy payload.
fn split_envelope(value: Value) -> std::result::Result<(u64, Value), Value> {
    match value {
        Value::Object(mut map) if map.len() == 2 && map.contains_key("data") => {
            match map.get("version").and_then(Value::as_u64) {
                Some(version) => {
                    let data = map.remove("data").unwrap_or(Value::Null);
                    Ok((version, data))
                }
                None => Err(Value::Object(map)),
            }
        }
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    #[tokio::test]
    async fn missing_key_reads_as_empty() {
        let store = LocalStore::in_memory();
        let items: Vec<i64> = store.read_list(KEY_REVIEWS).await;
        assert!(items.is_empty());
        assert_eq!(store.read_value::<String>(KEY_USER).await, None);
    }

    #[tokio::test]
    async fn invalid_json_reads_as_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.put(KEY_APPLICATIONS, "{not json").await.unwrap();
        let store = LocalStore::with_backend(backend);
        let items: Vec<i64> = store.read_list(KEY_APPLICATIONS).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn wrong_shape_reads_as_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.put(KEY_REVIEWS, r#"{"oops": true}"#).await.unwrap();
        let store = LocalStore::with_backend(backend);
        let items: Vec<i64> = store.read_list(KEY_REVIEWS).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn unversioned_blob_is_still_readable() {
        let backend = Arc::new(MemoryStore::new());
        backend.put(KEY_REVIEWS, "[3, 1, 2]").await.unwrap();
        let store = LocalStore::with_backend(backend);
        let items: Vec<i64> = store.read_list(KEY_REVIEWS).await;
        assert_eq!(items, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn newer_schema_version_is_rejected() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .put(KEY_REVIEWS, r#"{"version": 99, "data": [1, 2]}"#)
            .await
            .unwrap();
        let store = LocalStore::with_backend(backend);
        let items: Vec<i64> = store.read_list(KEY_REVIEWS).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn one_bad_record_does_not_hide_the_rest() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .put(KEY_REVIEWS, r#"[1, "two", 3]"#)
            .await
            .unwrap();
        let store = LocalStore::with_backend(backend);
        let items: Vec<i64> = store.read_list(KEY_REVIEWS).await;
        assert_eq!(items, vec![1, 3]);
    }

    #[tokio::test]
    async fn saving_a_snapshot_keeps_undecodable_records() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .put(KEY_REVIEWS, r#"[1, {"id": 40, "broken": true}, 3]"#)
            .await
            .unwrap();
        let store = LocalStore::with_backend(backend.clone());

        let mut snapshot = store.load_list::<i64>(KEY_REVIEWS).await.unwrap();
        assert_eq!(snapshot.rejected_ids().collect::<Vec<_>>(), vec![40]);
        snapshot.items.push(4);
        store.save_list(KEY_REVIEWS, &snapshot).await.unwrap();

        let raw = backend.get(KEY_REVIEWS).await.unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value["data"],
            serde_json::json!([{"id": 40, "broken": true}, 1, 3, 4])
        );
    }

    #[tokio::test]
    async fn newer_schema_version_is_never_overwritten() {
        let backend = Arc::new(MemoryStore::new());
        let future = r#"{"version": 99, "data": [1, 2]}"#;
        backend.put(KEY_REVIEWS, future).await.unwrap();
        let store = LocalStore::with_backend(backend.clone());

        assert!(store.load_list::<i64>(KEY_REVIEWS).await.is_err());
        assert_eq!(backend.get(KEY_REVIEWS).await.unwrap().as_deref(), Some(future));
    }

    #[tokio::test]
    async fn writes_are_tagged_with_schema_version() {
        let backend = Arc::new(MemoryStore::new());
        let store = LocalStore::with_backend(backend.clone());
        store.write_list(KEY_REVIEWS, &[7_i64, 8]).await.unwrap();

        let raw = backend.get(KEY_REVIEWS).await.unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["data"], serde_json::json!([7, 8]));
    }

    #[tokio::test]
    async fn write_replaces_whole_blob() {
        let store = LocalStore::in_memory();
        store.write_list(KEY_REVIEWS, &[1_i64, 2, 3]).await.unwrap();
        store.write_list(KEY_REVIEWS, &[9_i64]).await.unwrap();
        let items: Vec<i64> = store.read_list(KEY_REVIEWS).await;
        assert_eq!(items, vec![9]);
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_blob() {
        let backend = Arc::new(MemoryStore::new());
        let store = LocalStore::with_backend(backend.clone());
        store.write_list(KEY_REVIEWS, &[1_i64]).await.unwrap();

        backend.fail_writes(true);
        assert!(store.write_list(KEY_REVIEWS, &[1_i64, 2]).await.is_err());

        let items: Vec<i64> = store.read_list(KEY_REVIEWS).await;
        assert_eq!(items, vec![1]);
    }

    #[tokio::test]
    async fn remove_clears_key() {
        let store = LocalStore::in_memory();
        store.write_value(KEY_USER, "someone").await.unwrap();
        store.remove(KEY_USER).await.unwrap();
        assert_eq!(store.read_value::<String>(KEY_USER).await, None);
    }

    #[tokio::test]
    async fn sqlite_store_upserts() {
        let sqlite = SqliteStore::open_in_memory().unwrap();
        sqlite.put("k", "a").await.unwrap();
        sqlite.put("k", "b").await.unwrap();
        assert_eq!(sqlite.get("k").await.unwrap().as_deref(), Some("b"));
        sqlite.remove("k").await.unwrap();
        assert_eq!(sqlite.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("admit.db");

        {
            let store = LocalStore::new(SqliteStore::open(&path).unwrap());
            store.write_list(KEY_REVIEWS, &[4_i64, 5]).await.unwrap();
        }

        let reopened = LocalStore::new(SqliteStore::open(&path).unwrap());
        let items: Vec<i64> = reopened.read_list(KEY_REVIEWS).await;
        assert_eq!(items, vec![4, 5]);
    }
}
