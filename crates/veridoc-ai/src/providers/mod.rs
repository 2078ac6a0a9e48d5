//! AI 提供商实现

mod openai_compatible;

pub use openai_compatible::*;

use async_trait::async_trait;
use veridoc_core::Result;

use crate::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};

/// AI 提供商 Trait
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// 提供商名称
    fn name(&self) -> &str;

    /// 发送聊天请求
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// 生成嵌入向量
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// 获取可用模型列表
    async fn models(&self) -> Result<Vec<String>>;

    /// 检查健康状态
    async fn health_check(&self) -> Result<bool>;
}

/// 提供商配置
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: String,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: None,
            base_url: None,
            default_model: default_model.into(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}
