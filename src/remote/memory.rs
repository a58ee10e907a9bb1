//! In-process record store backed by DashMap

use super::RecordStore;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

type DocumentKey = (String, String);

#[derive(Default)]
pub struct MemoryRecordStore {
    documents: DashMap<DocumentKey, Value>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let key = (collection.to_string(), id.to_string());
        Ok(self.documents.get(&key).map(|doc| doc.clone()))
    }

    async fn put(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        self.documents
            .insert((collection.to_string(), id.to_string()), document);
        Ok(())
    }
}
