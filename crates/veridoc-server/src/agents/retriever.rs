//! 嵌入检索器
//!
//! 嵌入 + 向量存储的组合门面：写入侧生成文档嵌入入库，
//! 读取侧做 kNN 检索并截断内容控制 token 开销。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use veridoc_ai::EmbeddingProvider;
use veridoc_core::Result;
use veridoc_vector::{SearchQuery, VectorItem, VectorStore};

/// 单条检索内容的最大字符数
const MAX_CONTENT_CHARS: usize = 500;

/// 检索结果文档
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    pub source: String,
    pub score: f32,
}

pub struct EmbeddingRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl EmbeddingRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    /// 初始化底层索引 (幂等)
    pub async fn ensure_ready(&self) -> Result<()> {
        self.store.ensure_index(self.embedder.dimensions()).await
    }

    /// 嵌入并写入单个文档
    pub async fn add_document(&self, content: &str, metadata: serde_json::Value) -> Result<()> {
        let embedding = self.embedder.embed(content).await?;
        let item = VectorItem::new(
            embedding,
            serde_json::json!({
                "document": content,
                "metadata": metadata,
            }),
        );
        self.store.upsert(item).await
    }

    /// 批量写入
    pub async fn add_documents(&self, documents: &[(String, serde_json::Value)]) -> Result<usize> {
        let texts: Vec<String> = documents.iter().map(|(content, _)| content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let items: Vec<VectorItem> = documents
            .iter()
            .zip(embeddings)
            .map(|((content, metadata), embedding)| {
                VectorItem::new(
                    embedding,
                    serde_json::json!({
                        "document": content,
                        "metadata": metadata,
                    }),
                )
            })
            .collect();

        self.store.upsert_batch(items).await
    }

    /// kNN 检索，内容截断到 500 字符
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievedDocument>> {
        let k = top_k.unwrap_or(self.top_k);
        let query_embedding = self.embedder.embed(query).await?;

        let results = self
            .store
            .search(SearchQuery::new(query_embedding).with_limit(k))
            .await?;

        let documents = results
            .iter()
            .map(|r| {
                let content: String = r
                    .document()
                    .unwrap_or("")
                    .chars()
                    .take(MAX_CONTENT_CHARS)
                    .collect();
                RetrievedDocument {
                    content,
                    source: r.source().unwrap_or("Unknown").to_string(),
                    score: r.score,
                }
            })
            .collect::<Vec<_>>();

        tracing::info!("查询命中 {} 条相似文档", documents.len());
        Ok(documents)
    }

    pub async fn document_count(&self) -> Result<usize> {
        self.store.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;
    use veridoc_ai::RemoteEmbedding;
    use veridoc_vector::MemoryStore;

    fn retriever() -> EmbeddingRetriever {
        let provider = Arc::new(ScriptedProvider::with_replies(&[]));
        let embedder = Arc::new(RemoteEmbedding::new(provider, "test-embedding", 4));
        EmbeddingRetriever::new(embedder, Arc::new(MemoryStore::new()), 5)
    }

    #[tokio::test]
    async fn test_add_and_search() {
        let r = retriever();
        r.add_document("alpha knowledge entry", serde_json::json!({"source": "a.md"}))
            .await
            .unwrap();
        r.add_document("beta entry", serde_json::json!({"source": "b.md"}))
            .await
            .unwrap();

        // ScriptedProvider 的嵌入由首字符决定，同首字符 => 相似度 1.0
        let results = r.search("alpha question", Some(1)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "a.md");
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_search_truncates_long_content() {
        let r = retriever();
        let long_content = format!("a{}", "x".repeat(2000));
        r.add_document(&long_content, serde_json::json!({"source": "long.md"}))
            .await
            .unwrap();

        let results = r.search("a", Some(1)).await.unwrap();
        assert_eq!(results[0].content.chars().count(), 500);
    }

    #[tokio::test]
    async fn test_document_count() {
        let r = retriever();
        assert_eq!(r.document_count().await.unwrap(), 0);
        r.add_documents(&[
            ("one".to_string(), serde_json::json!({"source": "1"})),
            ("two".to_string(), serde_json::json!({"source": "2"})),
        ])
        .await
        .unwrap();
        assert_eq!(r.document_count().await.unwrap(), 2);
    }
}
