//! 应用状态装配
//!
//! 按配置装配提供商、向量存储、智能体和流水线，
//! 并维护 /status 暴露的服务状态表。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use veridoc_ai::{AiProvider, OpenAiCompatibleProvider, ProviderConfig, RemoteEmbedding};
use veridoc_core::{Config, Result, VectorBackend};
use veridoc_vector::{create_store, StoreBackend};

use crate::agents::{EmbeddingRetriever, KnowledgeAgent, SupervisorAgent, WebSearchTool};
use crate::docverify::VerificationPipeline;

pub struct AppState {
    pub config: Config,
    pub provider: Arc<dyn AiProvider>,
    pub retriever: Arc<EmbeddingRetriever>,
    pub knowledge: KnowledgeAgent,
    pub supervisor: SupervisorAgent,
    pub pipeline: VerificationPipeline,
    status: RwLock<HashMap<String, String>>,
}

impl AppState {
    pub fn build(config: Config) -> Result<Arc<Self>> {
        let provider: Arc<dyn AiProvider> = Arc::new(OpenAiCompatibleProvider::new(
            ProviderConfig::new("litellm", &config.ai.reasoning_model)
                .with_api_key(&config.ai.api_key)
                .with_base_url(&config.ai.base_url),
        ));

        let embedding_provider: Arc<dyn AiProvider> = Arc::new(OpenAiCompatibleProvider::new(
            ProviderConfig::new("embedding", &config.embedding.model)
                .with_api_key(&config.embedding.api_key)
                .with_base_url(&config.embedding.base_url),
        ));

        let embedder = Arc::new(RemoteEmbedding::new(
            embedding_provider,
            &config.embedding.model,
            config.embedding.dimension,
        ));

        let backend = match config.vector.backend {
            VectorBackend::Memory => StoreBackend::Memory,
            VectorBackend::OpenSearch => StoreBackend::OpenSearch {
                endpoint: config.vector.opensearch_endpoint.clone(),
                index: config.vector.index_name.clone(),
            },
        };
        let store = create_store(backend)?;

        let retriever = Arc::new(EmbeddingRetriever::new(
            embedder,
            store,
            config.vector.top_k,
        ));

        let knowledge = KnowledgeAgent::new(
            retriever.clone(),
            provider.clone(),
            &config.ai.reasoning_model,
            &config.knowledge.dir,
        );

        let web_search = WebSearchTool::new(
            &config.search.endpoint,
            &config.search.api_key,
            config.search.max_results,
        );
        let supervisor = SupervisorAgent::new(
            provider.clone(),
            &config.ai.reasoning_model,
            retriever.clone(),
            Some(web_search),
        );

        let pipeline = VerificationPipeline::new(provider.clone(), &config);

        Ok(Arc::new(Self {
            config,
            provider,
            retriever,
            knowledge,
            supervisor,
            pipeline,
            status: RwLock::new(HashMap::new()),
        }))
    }

    /// 探测各依赖服务，刷新状态表
    pub async fn probe_services(&self) {
        let mut status = HashMap::new();

        match self.retriever.document_count().await {
            Ok(count) => {
                status.insert("vector_store".to_string(), "connected".to_string());
                status.insert(
                    "knowledge_base".to_string(),
                    format!("ready ({} documents)", count),
                );
            }
            Err(e) => {
                tracing::warn!("向量存储探测失败: {}", e);
                status.insert("vector_store".to_string(), "disconnected".to_string());
                status.insert("knowledge_base".to_string(), "error".to_string());
            }
        }

        status.insert(
            "web_search".to_string(),
            if self.config.search.api_key.is_empty() {
                "unconfigured".to_string()
            } else {
                "configured".to_string()
            },
        );

        match self.provider.health_check().await {
            Ok(true) => status.insert("ai_gateway".to_string(), "ready".to_string()),
            _ => status.insert("ai_gateway".to_string(), "unconfigured".to_string()),
        };

        *self.status.write().await = status;
    }

    pub async fn service_status(&self) -> HashMap<String, String> {
        self.status.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.ai.api_key = "sk-test".to_string();
        config
    }

    #[tokio::test]
    async fn test_build_with_memory_backend() {
        let state = AppState::build(test_config()).unwrap();
        assert_eq!(state.provider.name(), "litellm");
    }

    #[tokio::test]
    async fn test_probe_services_populates_status() {
        let state = AppState::build(test_config()).unwrap();
        state.probe_services().await;

        let status = state.service_status().await;
        assert_eq!(status.get("vector_store").unwrap(), "connected");
        assert_eq!(status.get("knowledge_base").unwrap(), "ready (0 documents)");
        assert_eq!(status.get("web_search").unwrap(), "unconfigured");
        assert_eq!(status.get("ai_gateway").unwrap(), "ready");
    }
}
