use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoDbClient, Error as DynamoDbError};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{StoreConfig, StoreKind};

/// Errors raised by key-value backends
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(#[from] DynamoDbError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Text key-value store backing a cache tier
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Process-local store, contents are lost on exit
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk.
///
/// The whole map is rewritten on every `set`; the file is small (one watch-list
/// batch plus its timestamp).
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store, starting empty when the file is missing or unreadable
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries: HashMap<String, String> = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("⚠️ Ignoring corrupt store file {}: {e}", path.display());
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!("🗃️ File store opened at {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());

        let contents = serde_json::to_string_pretty(&*entries)?;
        tokio::fs::write(&self.path, contents).await?;
        debug!("💾 Persisted {} keys to {}", entries.len(), self.path.display());
        Ok(())
    }
}

/// DynamoDB-backed store: one item per key, `cache_key` partition key, `value` string attribute
pub struct DynamoDbStore {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbStore {
    pub async fn new(table_name: String) -> Result<Self, StorageError> {
        if table_name.is_empty() {
            return Err(StorageError::Configuration(
                "DYNAMODB_TABLE_NAME environment variable not set".to_string(),
            ));
        }

        let config = aws_config::defaults(BehaviorVersion::v2025_01_17())
            .load()
            .await;

        let client = DynamoDbClient::new(&config);

        info!("🗃️ DynamoDB client initialized for table: {table_name}");

        Ok(Self { client, table_name })
    }
}

fn value_from_item(item: &HashMap<String, AttributeValue>) -> Option<String> {
    item.get("value").and_then(|v| v.as_s().ok()).cloned()
}

fn item_for(key: &str, value: &str) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("cache_key".to_string(), AttributeValue::S(key.to_string()));
    item.insert("value".to_string(), AttributeValue::S(value.to_string()));
    item.insert(
        "updated_at".to_string(),
        AttributeValue::S(chrono::Utc::now().to_rfc3339()),
    );
    item
}

#[async_trait]
impl KeyValueStore for DynamoDbStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("cache_key", AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| StorageError::DynamoDb(DynamoDbError::from(e)))?;

        match result.item {
            Some(item) => {
                let value = value_from_item(&item);
                if value.is_none() {
                    warn!("⚠️ Invalid value format for key: {key}");
                }
                Ok(value)
            }
            None => {
                debug!("🔍 No item found for key: {key}");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_for(key, value)))
            .send()
            .await
            .map_err(|e| StorageError::DynamoDb(DynamoDbError::from(e)))?;

        debug!("✅ Saved key {key} to {}", self.table_name);
        Ok(())
    }
}

// Factory function to create the durable store selected by configuration
pub async fn create_storage(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match config.kind {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::File => Ok(Arc::new(JsonFileStore::open(&config.path).await?)),
        StoreKind::DynamoDb => {
            let table_name = config.table_name.clone().unwrap_or_default();
            Ok(Arc::new(DynamoDbStore::new(table_name).await?))
        }
    }
}
