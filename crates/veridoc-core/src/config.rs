//! 配置管理
//!
//! 配置来源：可选的 YAML 配置文件 (~/.veridoc/config.yaml) 作为基础，
//! 环境变量覆盖。环境变量名沿用部署约定 (LITELLM_API_KEY 等)。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, VeriDocError};

/// 主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 服务配置
    pub server: ServerConfig,
    /// AI 提供商配置
    pub ai: AiConfig,
    /// 嵌入配置
    pub embedding: EmbeddingConfig,
    /// 向量存储配置
    pub vector: VectorConfig,
    /// Web 搜索配置
    pub search: SearchConfig,
    /// 知识库配置
    pub knowledge: KnowledgeConfig,
    /// 文档校验流水线配置
    pub pipeline: PipelineConfig,
}

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
        }
    }
}

/// AI 提供商配置
///
/// 视觉模型负责文档抽取，推理模型负责反思评估和问答，
/// 两者走同一个 OpenAI 兼容网关。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub reasoning_model: String,
    pub vision_model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            reasoning_model: "qwen-qwq-32b-preview".to_string(),
            vision_model: "vllm-server-qwen-vision".to_string(),
            temperature: Some(0.7),
            max_tokens: Some(1500),
        }
    }
}

/// 嵌入配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// 目标向量维度，响应维度不符时重采样
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "llamacpp-embedding".to_string(),
            dimension: 384,
        }
    }
}

/// 向量存储后端
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    Memory,
    OpenSearch,
}

impl Default for VectorBackend {
    fn default() -> Self {
        VectorBackend::Memory
    }
}

/// 向量存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub backend: VectorBackend,
    pub opensearch_endpoint: String,
    pub index_name: String,
    pub top_k: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            opensearch_endpoint: String::new(),
            index_name: "knowledge-embeddings".to_string(),
            top_k: 5,
        }
    }
}

/// Web 搜索配置 (Tavily 兼容 API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: String,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.tavily.com".to_string(),
            api_key: String::new(),
            max_results: 5,
        }
    }
}

/// 知识库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub dir: PathBuf,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("knowledge"),
        }
    }
}

/// 文档校验流水线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 自动审批的置信度阈值
    pub confidence_threshold: f64,
    /// 反思节点 JSON 输出的最大尝试次数
    pub reflection_attempts: usize,
    /// 外部节点 (存储/校验) 的重试次数
    pub node_retry_attempts: usize,
    /// 外部存储端点，为空时走本地 stub
    pub storage_endpoint: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.75,
            reflection_attempts: 3,
            node_retry_attempts: 3,
            storage_endpoint: String::new(),
        }
    }
}

fn env_string(key: &str, target: &mut String) {
    if let Ok(v) = std::env::var(key) {
        if !v.is_empty() {
            *target = v;
        }
    }
}

impl Config {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".veridoc").join("config.yaml"))
    }

    /// 加载配置：文件 (存在时) + 环境变量覆盖
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!("加载配置文件: {}", path.display());
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| VeriDocError::Config(format!("解析配置文件失败 {}: {}", path.display(), e)))
    }

    /// 仅从环境变量构建
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        env_string("SERVER_HOST", &mut self.server.host);
        if let Ok(v) = std::env::var("SERVER_PORT") {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }

        env_string("LITELLM_API_KEY", &mut self.ai.api_key);
        env_string("LITELLM_BASE_URL", &mut self.ai.base_url);
        env_string("REASONING_MODEL", &mut self.ai.reasoning_model);
        env_string("VISION_MODEL", &mut self.ai.vision_model);

        // 嵌入端点未单独配置时与推理网关共用凭证
        if self.embedding.api_key.is_empty() {
            self.embedding.api_key = self.ai.api_key.clone();
        }
        env_string("EMBEDDING_API_KEY", &mut self.embedding.api_key);
        env_string("EMBEDDING_BASE_URL", &mut self.embedding.base_url);
        env_string("EMBEDDING_MODEL", &mut self.embedding.model);

        env_string("OPENSEARCH_ENDPOINT", &mut self.vector.opensearch_endpoint);
        env_string("VECTOR_INDEX_NAME", &mut self.vector.index_name);
        if let Ok(v) = std::env::var("TOP_K_RESULTS") {
            if let Ok(k) = v.parse() {
                self.vector.top_k = k;
            }
        }
        if let Ok(v) = std::env::var("VECTOR_BACKEND") {
            match v.as_str() {
                "memory" => self.vector.backend = VectorBackend::Memory,
                "opensearch" => self.vector.backend = VectorBackend::OpenSearch,
                _ => {}
            }
        } else if !self.vector.opensearch_endpoint.is_empty() {
            self.vector.backend = VectorBackend::OpenSearch;
        }

        env_string("TAVILY_API_URL", &mut self.search.endpoint);
        env_string("TAVILY_API_KEY", &mut self.search.api_key);

        if let Ok(v) = std::env::var("KNOWLEDGE_DIR") {
            if !v.is_empty() {
                self.knowledge.dir = PathBuf::from(v);
            }
        }

        env_string("STORAGE_ENDPOINT", &mut self.pipeline.storage_endpoint);
    }

    /// 校验必填配置
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.ai.api_key.is_empty() {
            missing.push("LITELLM_API_KEY");
        }
        if self.vector.backend == VectorBackend::OpenSearch
            && self.vector.opensearch_endpoint.is_empty()
        {
            missing.push("OPENSEARCH_ENDPOINT");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(VeriDocError::Config(format!(
                "缺少必需的环境变量: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.vector.index_name, "knowledge-embeddings");
        assert_eq!(config.vector.top_k, 5);
        assert_eq!(config.pipeline.confidence_threshold, 0.75);
        assert_eq!(config.pipeline.reflection_attempts, 3);
        assert_eq!(config.vector.backend, VectorBackend::Memory);
    }

    #[test]
    fn test_validate_missing_api_key() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("LITELLM_API_KEY"));
    }

    #[test]
    fn test_validate_opensearch_requires_endpoint() {
        let mut config = Config::default();
        config.ai.api_key = "sk-test".to_string();
        config.vector.backend = VectorBackend::OpenSearch;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OPENSEARCH_ENDPOINT"));

        config.vector.opensearch_endpoint = "https://search.example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "server:\n  port: 9000\nvector:\n  top_k: 3\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.vector.top_k, 3);
        // 未出现的段落保持默认值
        assert_eq!(config.embedding.dimension, 384);
    }
}
