//! 向量存储抽象层实现

mod memory;
mod opensearch;

use async_trait::async_trait;
use std::sync::Arc;
use veridoc_core::Result;

pub use memory::MemoryStore;
pub use opensearch::OpenSearchStore;

use super::types::{SearchQuery, SearchResult, StoreStats, VectorItem};

/// 向量存储 Trait
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 确保索引存在 (幂等)
    async fn ensure_index(&self, dimension: usize) -> Result<()>;
    async fn upsert(&self, item: VectorItem) -> Result<()>;
    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize>;
    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>>;
    async fn count(&self) -> Result<usize>;
    async fn stats(&self) -> Result<StoreStats>;
    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Memory,
    OpenSearch { endpoint: String, index: String },
}

pub fn create_store(backend: StoreBackend) -> Result<Arc<dyn VectorStore>> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::OpenSearch { endpoint, index } => {
            Ok(Arc::new(OpenSearchStore::new(endpoint, index)))
        }
    }
}
