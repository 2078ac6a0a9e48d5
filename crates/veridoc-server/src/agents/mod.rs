//! 多智能体 RAG
//!
//! 知识库检索、Web 搜索与监督路由。

mod knowledge;
mod retriever;
mod supervisor;
mod web_search;

pub use knowledge::{EmbedSummary, KnowledgeAgent, KnowledgeAnswer, KnowledgeFile};
pub use retriever::{EmbeddingRetriever, RetrievedDocument};
pub use supervisor::{QueryRoute, SupervisorAgent, SupervisorResponse};
pub use web_search::{WebSearchHit, WebSearchResponse, WebSearchTool};
