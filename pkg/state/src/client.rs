use serde::Serialize;
use serde::de::DeserializeOwned;
use slatedb::Db;
use slatedb::object_store::local::LocalFileSystem;
use slatedb::object_store::path::Path;
use std::sync::Arc;
use tracing::info;

/// Persistent key-value store backed by SlateDB on a local filesystem.
///
/// SlateDB admits a single writer per data directory, so one `StateStore`
/// is opened per process and cloned wherever it is needed.
#[derive(Clone)]
pub struct StateStore {
    db: Db,
}

impl StateStore {
    /// Open (or create) a state store rooted at `path` on the local filesystem.
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        info!("Opening SlateDB state store at {}", path);

        std::fs::create_dir_all(path)
            .map_err(|e| anyhow::anyhow!("Failed to create data directory {}: {}", path, e))?;

        let object_store = Arc::new(
            LocalFileSystem::new_with_prefix(path)
                .map_err(|e| anyhow::anyhow!("Failed to create local object store: {}", e))?,
        );
        let db = Db::open(Path::from("/"), object_store)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open SlateDB: {}", e))?;
        Ok(Self { db })
    }

    pub async fn put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.db
            .put(key.as_bytes(), value)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("SlateDB put failed: {}", e))
    }

    /// Retrieve the value for a key, or `None` if it does not exist.
    pub async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        match self.db.get(key.as_bytes()).await {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("SlateDB get failed: {}", e)),
        }
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.db
            .delete(key.as_bytes())
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("SlateDB delete failed: {}", e))
    }

    /// Serialize `value` as JSON and store it under `key`.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let data = serde_json::to_vec(value)?;
        self.put(key, &data).await
    }

    /// Fetch and decode a JSON value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key).await? {
            Some(data) => {
                let value = serde_json::from_slice(&data)
                    .map_err(|e| anyhow::anyhow!("Corrupt value at {}: {}", key, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// List all key-value pairs whose keys start with `prefix`.
    /// Returns them as `(key_string, raw_bytes)` in key order.
    pub async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        let mut results = Vec::new();
        let mut iter = self
            .db
            .scan_prefix(prefix.as_bytes())
            .await
            .map_err(|e| anyhow::anyhow!("SlateDB scan_prefix failed: {}", e))?;

        loop {
            match iter.next().await {
                Ok(Some(kv)) => {
                    let key = String::from_utf8_lossy(&kv.key).to_string();
                    results.push((key, kv.value.to_vec()));
                }
                Ok(None) => break,
                Err(e) => return Err(anyhow::anyhow!("SlateDB scan failed: {}", e)),
            }
        }
        Ok(results)
    }

    /// Gracefully close the state store, flushing pending writes.
    pub async fn close(self) -> anyhow::Result<()> {
        info!("Closing SlateDB state store");
        self.db
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("SlateDB close failed: {}", e))
    }
}

// ─── Tests ─────────────────────────────────────────────────────
