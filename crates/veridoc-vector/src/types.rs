//! 向量存储类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 向量项
///
/// payload 约定字段：`document` 为原文内容，`metadata.source` 为来源文件。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorItem {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl VectorItem {
    pub fn new(vector: Vec<f32>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// 原文内容
    pub fn document(&self) -> Option<&str> {
        self.payload.get("document").and_then(|v| v.as_str())
    }
}

/// 搜索查询
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// 查询向量
    pub vector: Vec<f32>,
    /// 返回数量
    pub limit: usize,
    /// 最小相似度
    pub min_score: Option<f32>,
}

impl SearchQuery {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            limit: 5,
            min_score: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = Some(score);
        self
    }
}

/// 搜索结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

impl SearchResult {
    pub fn document(&self) -> Option<&str> {
        self.payload.get("document").and_then(|v| v.as_str())
    }

    pub fn source(&self) -> Option<&str> {
        self.payload
            .get("metadata")
            .and_then(|m| m.get("source"))
            .and_then(|v| v.as_str())
    }
}

/// 存储统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_vectors: usize,
    pub last_updated: DateTime<Utc>,
}
