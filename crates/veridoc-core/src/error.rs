//! 统一错误处理

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VeriDocError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("AI 提供商错误: {0}")]
    AiProvider(String),

    #[error("向量存储错误: {0}")]
    VectorStore(String),

    #[error("嵌入错误: {0}")]
    Embedding(String),

    #[error("流水线错误: {0}")]
    Pipeline(String),

    #[error("智能体错误: {0}")]
    Agent(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP 请求错误: {0}")]
    Http(String),

    #[error("API 错误: {0}")]
    Api(String),

    #[error("解析错误: {0}")]
    Parse(String),

    #[error("未知错误: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, VeriDocError>;
