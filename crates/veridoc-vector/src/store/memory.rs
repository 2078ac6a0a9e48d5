//! 内存向量存储 (用于测试和开发)

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{SearchQuery, SearchResult, StoreStats, VectorItem};
use crate::VectorStore;
use veridoc_core::{Result, VeriDocError};

/// 内存向量存储
pub struct MemoryStore {
    data: RwLock<HashMap<String, VectorItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }

    fn lock_err() -> VeriDocError {
        VeriDocError::VectorStore("Lock poisoned".to_string())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_index(&self, _dimension: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, item: VectorItem) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::lock_err())?;
        data.insert(item.id.clone(), item);
        Ok(())
    }

    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize> {
        let mut data = self.data.write().map_err(|_| Self::lock_err())?;
        let count = items.len();
        for item in items {
            data.insert(item.id.clone(), item);
        }
        Ok(count)
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        let data = self.data.read().map_err(|_| Self::lock_err())?;

        let mut results: Vec<SearchResult> = data
            .values()
            .map(|item| SearchResult {
                id: item.id.clone(),
                score: Self::cosine_similarity(&query.vector, &item.vector),
                payload: item.payload.clone(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(min_score) = query.min_score {
            results.retain(|r| r.score >= min_score);
        }

        results.truncate(query.limit);

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let data = self.data.read().map_err(|_| Self::lock_err())?;
        Ok(data.len())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let data = self.data.read().map_err(|_| Self::lock_err())?;
        Ok(StoreStats {
            total_vectors: data.len(),
            last_updated: Utc::now(),
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::lock_err())?;
        data.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upsert_and_search() {
        let store = MemoryStore::new();

        let item = VectorItem::new(vec![1.0, 0.0, 0.0], json!({"document": "A"}));
        let id = item.id.clone();
        store.upsert(item).await.unwrap();
        store
            .upsert(VectorItem::new(vec![0.0, 1.0, 0.0], json!({"document": "B"})))
            .await
            .unwrap();

        let query = SearchQuery::new(vec![1.0, 0.0, 0.0]).with_limit(1);
        let results = store.search(query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_search_min_score_filters() {
        let store = MemoryStore::new();
        store
            .upsert(VectorItem::new(vec![1.0, 0.0], json!({"document": "close"})))
            .await
            .unwrap();
        store
            .upsert(VectorItem::new(vec![-1.0, 0.0], json!({"document": "far"})))
            .await
            .unwrap();

        let query = SearchQuery::new(vec![1.0, 0.0]).with_limit(10).with_min_score(0.5);
        let results = store.search(query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document(), Some("close"));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let store = MemoryStore::new();
        let first = VectorItem::new(vec![1.0], json!({"document": "v1"})).with_id("k");
        let second = VectorItem::new(vec![1.0], json!({"document": "v2"})).with_id("k");

        store.upsert(first).await.unwrap();
        store.upsert(second).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryStore::new();
        store
            .upsert_batch(vec![
                VectorItem::new(vec![1.0], json!({})),
                VectorItem::new(vec![2.0], json!({})),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_upserts() {
        use tokio::task;

        let store = Arc::new(MemoryStore::new());
        let store_clone = store.clone();

        let handle = task::spawn(async move {
            for i in 0..100 {
                let item = VectorItem::new(vec![i as f32, 0.0], json!({"index": i}));
                store_clone.upsert(item).await.unwrap();
            }
        });

        for i in 0..100 {
            let item = VectorItem::new(vec![i as f32, 1.0], json!({"index": i}));
            store.upsert(item).await.unwrap();
        }

        handle.await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_vectors, 200);
    }
}
