//! OpenSearch 向量存储
//!
//! 通过 REST API 访问 OpenSearch kNN 索引。索引映射：hnsw + cosinesimil，
//! `embedding` 为 knn_vector，原文存 `document`，元数据存 `metadata`。

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::types::{SearchQuery, SearchResult, StoreStats, VectorItem};
use crate::VectorStore;
use veridoc_core::{Result, VeriDocError};

pub struct OpenSearchStore {
    endpoint: String,
    index: String,
    client: reqwest::Client,
}

impl OpenSearchStore {
    pub fn new(endpoint: impl Into<String>, index: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index: index.into(),
            client: reqwest::Client::new(),
        }
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.index)
    }

    fn index_mapping(dimension: usize) -> serde_json::Value {
        json!({
            "settings": {
                "index": {
                    "knn": true,
                    "knn.space_type": "cosinesimil"
                }
            },
            "mappings": {
                "properties": {
                    "embedding": {
                        "type": "knn_vector",
                        "dimension": dimension,
                        "method": {
                            "name": "hnsw",
                            "space_type": "cosinesimil",
                            "engine": "nmslib",
                            "parameters": {
                                "ef_construction": 128,
                                "m": 16
                            }
                        }
                    },
                    "document": {
                        "type": "text",
                        "store": true
                    },
                    "metadata": {
                        "type": "object"
                    },
                    "timestamp": {
                        "type": "date"
                    }
                }
            }
        })
    }

    fn doc_body(item: &VectorItem) -> serde_json::Value {
        json!({
            "embedding": item.vector,
            "document": item.payload.get("document").cloned().unwrap_or(json!("")),
            "metadata": item.payload.get("metadata").cloned().unwrap_or(json!({})),
            "timestamp": item.created_at.to_rfc3339(),
        })
    }

    /// hit -> SearchResult，元数据仅保留 source 字段以控制 token 开销
    fn hit_to_result(hit: &serde_json::Value) -> SearchResult {
        let source = &hit["_source"];
        let origin = source["metadata"]["source"]
            .as_str()
            .unwrap_or("Unknown")
            .to_string();

        SearchResult {
            id: hit["_id"].as_str().unwrap_or("").to_string(),
            score: hit["_score"].as_f64().unwrap_or(0.0) as f32,
            payload: json!({
                "document": source["document"].as_str().unwrap_or(""),
                "metadata": { "source": origin },
            }),
        }
    }

    fn request_err(e: reqwest::Error) -> VeriDocError {
        VeriDocError::Http(format!("OpenSearch 请求失败: {}", e))
    }

    async fn expect_success(response: reqwest::Response, op: &str) -> Result<serde_json::Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VeriDocError::VectorStore(format!(
                "OpenSearch {} 失败 ({}): {}",
                op, status, body
            )));
        }
        response
            .json()
            .await
            .map_err(|e| VeriDocError::VectorStore(format!("OpenSearch 响应解析失败: {}", e)))
    }
}

#[async_trait]
impl VectorStore for OpenSearchStore {
    async fn ensure_index(&self, dimension: usize) -> Result<()> {
        let exists = self
            .client
            .head(self.index_url())
            .send()
            .await
            .map_err(Self::request_err)?
            .status()
            .is_success();

        if exists {
            tracing::info!("索引 {} 已存在", self.index);
            return Ok(());
        }

        let response = self
            .client
            .put(self.index_url())
            .json(&Self::index_mapping(dimension))
            .send()
            .await
            .map_err(Self::request_err)?;

        Self::expect_success(response, "创建索引").await?;
        tracing::info!("已创建索引 {} (dimension={})", self.index, dimension);
        Ok(())
    }

    async fn upsert(&self, item: VectorItem) -> Result<()> {
        let url = format!("{}/_doc/{}?refresh=true", self.index_url(), item.id);
        let response = self
            .client
            .put(&url)
            .json(&Self::doc_body(&item))
            .send()
            .await
            .map_err(Self::request_err)?;

        Self::expect_success(response, "写入文档").await?;
        Ok(())
    }

    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        // _bulk 为 NDJSON：action 行 + 数据行交替
        let mut body = String::new();
        for item in &items {
            let action = json!({"index": {"_index": self.index, "_id": item.id}});
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&Self::doc_body(item).to_string());
            body.push('\n');
        }

        let url = format!("{}/_bulk?refresh=true", self.endpoint);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(Self::request_err)?;

        let json = Self::expect_success(response, "批量写入").await?;
        if json["errors"].as_bool().unwrap_or(false) {
            return Err(VeriDocError::VectorStore(format!(
                "OpenSearch 批量写入存在失败项: {}",
                json
            )));
        }

        tracing::info!("已批量写入 {} 个文档到 {}", items.len(), self.index);
        Ok(items.len())
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        let body = json!({
            "size": query.limit,
            "query": {
                "knn": {
                    "embedding": {
                        "vector": query.vector,
                        "k": query.limit
                    }
                }
            },
            "_source": ["document", "metadata"]
        });

        let url = format!("{}/_search", self.index_url());
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::request_err)?;

        let json = Self::expect_success(response, "检索").await?;

        let mut results: Vec<SearchResult> = json["hits"]["hits"]
            .as_array()
            .map(|hits| hits.iter().map(Self::hit_to_result).collect())
            .unwrap_or_default();

        if let Some(min_score) = query.min_score {
            results.retain(|r| r.score >= min_score);
        }

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let url = format!("{}/_count", self.index_url());
        let response = self.client.get(&url).send().await.map_err(Self::request_err)?;
        let json = Self::expect_success(response, "计数").await?;
        Ok(json["count"].as_u64().unwrap_or(0) as usize)
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            total_vectors: self.count().await?,
            last_updated: Utc::now(),
        })
    }

    async fn clear(&self) -> Result<()> {
        let url = format!("{}/_delete_by_query?refresh=true", self.index_url());
        let response = self
            .client
            .post(&url)
            .json(&json!({"query": {"match_all": {}}}))
            .send()
            .await
            .map_err(Self::request_err)?;

        Self::expect_success(response, "清空索引").await?;
        Ok(())
    }
}
