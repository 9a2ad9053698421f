//! Storage backend for the model registry
//!
//! Rows are bincode-encoded under a key prefix, either in a sled database
//! (when a path is configured) or in an in-memory map. The promotion flip is
//! applied as a single sled batch so on-disk state never holds a partially
//! promoted row set.

use crate::errors::{RegistryError, Result};
use crate::types::ModelRecord;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use uuid::Uuid;

const RECORD_PREFIX: &str = "model_record:";

fn record_key(model_id: &Uuid) -> String {
    format!("{RECORD_PREFIX}{model_id}")
}

/// Storage backend for registry rows
pub struct RegistryStorage {
    /// sled database; in-memory map only when absent
    db: Option<sled::Db>,
    /// In-memory rows protected by an async-aware lock
    cache: RwLock<HashMap<String, Vec<u8>>>,
}

impl RegistryStorage {
    /// Create a new storage backend
    pub fn new(db_path: Option<&Path>) -> Result<Self> {
        let db = if let Some(path) = db_path {
            Some(sled::open(path).map_err(|e| RegistryError::Storage(e.to_string()))?)
        } else {
            None
        };

        Ok(Self {
            db,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn encode(record: &ModelRecord) -> Result<Vec<u8>> {
        bincode::serialize(record)
            .map_err(|e| RegistryError::Internal(format!("Serialization error: {e}")))
    }

    fn decode(data: &[u8]) -> Result<ModelRecord> {
        bincode::deserialize(data)
            .map_err(|e| RegistryError::Internal(format!("Serialization error: {e}")))
    }

    /// Store one registry row
    pub async fn store_record(&self, record: &ModelRecord) -> Result<()> {
        let key = record_key(&record.model_id);
        let data = Self::encode(record)?;

        if let Some(ref db) = self.db {
            db.insert(key.as_bytes(), data.as_slice())
                .map_err(|e| RegistryError::Storage(e.to_string()))?;
            db.flush()
                .map_err(|e| RegistryError::Storage(e.to_string()))?;
        } else {
            self.cache.write().await.insert(key, data);
        }

        Ok(())
    }

    /// Load one registry row
    pub async fn load_record(&self, model_id: &Uuid) -> Result<Option<ModelRecord>> {
        let key = record_key(model_id);

        let data = if let Some(ref db) = self.db {
            db.get(key.as_bytes())
                .map_err(|e| RegistryError::Storage(e.to_string()))?
                .map(|v| v.to_vec())
        } else {
            self.cache.read().await.get(&key).cloned()
        };

        match data {
            Some(data) => Ok(Some(Self::decode(&data)?)),
            None => Ok(None),
        }
    }

    /// List all registry rows
    pub async fn list_records(&self) -> Result<Vec<ModelRecord>> {
        let mut records = Vec::new();

        if let Some(ref db) = self.db {
            for item in db.scan_prefix(RECORD_PREFIX.as_bytes()) {
                let (_, value) = item.map_err(|e| RegistryError::Storage(e.to_string()))?;
                records.push(Self::decode(&value)?);
            }
        } else {
            let cache = self.cache.read().await;
            for (key, value) in cache.iter() {
                if key.starts_with(RECORD_PREFIX) {
                    records.push(Self::decode(value)?);
                }
            }
        }

        // Stable order for callers regardless of backend iteration order
        records.sort_by(|a, b| {
            a.train_date
                .cmp(&b.train_date)
                .then_with(|| a.version_tag.cmp(&b.version_tag))
        });
        Ok(records)
    }

    /// Flip `promoted` to the target row and clear it everywhere else,
    /// applied atomically.
    ///
    /// Returns the updated target row. Holds the cache write lock for the
    /// whole read-modify-write so two promotions cannot interleave, and uses
    /// a single sled batch so a crash cannot leave two promoted rows behind.
    pub async fn apply_promotion(&self, target: &Uuid) -> Result<ModelRecord> {
        let mut cache = self.cache.write().await;

        let mut rows: Vec<ModelRecord> = if let Some(ref db) = self.db {
            let mut rows = Vec::new();
            for item in db.scan_prefix(RECORD_PREFIX.as_bytes()) {
                let (_, value) = item.map_err(|e| RegistryError::Storage(e.to_string()))?;
                rows.push(Self::decode(&value)?);
            }
            rows
        } else {
            let mut rows = Vec::new();
            for (key, value) in cache.iter() {
                if key.starts_with(RECORD_PREFIX) {
                    rows.push(Self::decode(value)?);
                }
            }
            rows
        };

        if !rows.iter().any(|r| &r.model_id == target) {
            return Err(RegistryError::PromotionConflict(format!(
                "Model {target} is not registered"
            )));
        }

        for row in &mut rows {
            row.promoted = &row.model_id == target;
        }

        if let Some(ref db) = self.db {
            let mut batch = sled::Batch::default();
            for row in &rows {
                batch.insert(
                    record_key(&row.model_id).into_bytes(),
                    Self::encode(row)?,
                );
            }
            db.apply_batch(batch)
                .map_err(|e| RegistryError::PromotionConflict(e.to_string()))?;
            db.flush()
                .map_err(|e| RegistryError::PromotionConflict(e.to_string()))?;
        } else {
            for row in &rows {
                cache.insert(record_key(&row.model_id), Self::encode(row)?);
            }
        }

        rows.into_iter()
            .find(|r| &r.model_id == target)
            .ok_or_else(|| RegistryError::Internal("Promoted row vanished mid-flip".to_string()))
    }
}
