use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::CheckpointStore;
use crate::db::DbError;

/// Process-local checkpoint store. Progress is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    values: Mutex<HashMap<String, u64>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_checkpoint(key: &str, block_number: u64) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_string(), block_number);
        Self {
            values: Mutex::new(values),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<u64>, DbError> {
        Ok(self.values.lock().await.get(key).copied())
    }

    async fn store(&self, key: &str, block_number: u64) -> Result<(), DbError> {
        self.values.lock().await.insert(key.to_string(), block_number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_then_stored() {
        let store = MemoryCheckpointStore::new();
        assert_eq!(store.load("last").await.unwrap(), None);

        store.store("last", 42).await.unwrap();
        assert_eq!(store.load("last").await.unwrap(), Some(42));
        assert_eq!(store.load("other").await.unwrap(), None);
    }
}
