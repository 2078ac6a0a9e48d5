//! 监督智能体
//!
//! 路由规则：优先查知识库；召回为空或最佳相关度低于阈值时
//! 补充 Web 搜索；综合两路上下文生成最终回答。
//! 任一检索来源失败只降级，不让整个查询失败。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use veridoc_ai::{AiProvider, ChatRequest};
use veridoc_core::{Message, Result};

use super::retriever::{EmbeddingRetriever, RetrievedDocument};
use super::web_search::{WebSearchResponse, WebSearchTool};

/// 查询截断长度 (避免上下文窗口溢出)
const MAX_QUERY_CHARS: usize = 500;
/// 回答截断长度
const MAX_RESPONSE_CHARS: usize = 4000;
/// 触发 Web 搜索的知识库相关度下限
const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.6;

/// 本次查询实际使用的检索路径
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryRoute {
    KnowledgeBase,
    WebSearch,
    Combined,
    /// 无可用上下文，模型直接作答
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorResponse {
    pub answer: String,
    pub route: QueryRoute,
    pub sources: Vec<String>,
}

pub struct SupervisorAgent {
    provider: Arc<dyn AiProvider>,
    model: String,
    retriever: Arc<EmbeddingRetriever>,
    web_search: Option<WebSearchTool>,
    relevance_threshold: f32,
}

impl SupervisorAgent {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        model: impl Into<String>,
        retriever: Arc<EmbeddingRetriever>,
        web_search: Option<WebSearchTool>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            retriever,
            web_search,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }

    pub fn with_relevance_threshold(mut self, threshold: f32) -> Self {
        self.relevance_threshold = threshold;
        self
    }

    /// 处理一次用户查询
    pub async fn process(&self, question: &str) -> Result<SupervisorResponse> {
        let question = truncate_chars(question.trim(), MAX_QUERY_CHARS, "查询");

        // 第一路：知识库
        let kb_documents = match self.retriever.search(&question, None).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::error!("知识库检索失败，降级继续: {}", e);
                Vec::new()
            }
        };

        let best_score = kb_documents.first().map(|d| d.score).unwrap_or(0.0);
        let need_web = kb_documents.is_empty() || best_score < self.relevance_threshold;

        // 第二路：Web 搜索 (仅在知识库召回不足时)
        let web_response = if need_web {
            match &self.web_search {
                Some(tool) if tool.is_configured() => {
                    tracing::info!(
                        "知识库相关度不足 (best={:.2})，启用 Web 搜索",
                        best_score
                    );
                    match tool.search(&question).await {
                        Ok(response) => Some(response),
                        Err(e) => {
                            tracing::error!("Web 搜索失败，降级继续: {}", e);
                            None
                        }
                    }
                }
                _ => None,
            }
        } else {
            None
        };

        let route = match (!kb_documents.is_empty(), web_response.is_some()) {
            (true, true) => QueryRoute::Combined,
            (true, false) => QueryRoute::KnowledgeBase,
            (false, true) => QueryRoute::WebSearch,
            (false, false) => QueryRoute::Direct,
        };

        let mut sources: Vec<String> = kb_documents.iter().map(|d| d.source.clone()).collect();
        if let Some(web) = &web_response {
            sources.extend(web.results.iter().map(|r| r.url.clone()));
        }

        let prompt = Self::build_prompt(&question, &kb_documents, web_response.as_ref());
        let request = ChatRequest::new(&self.model, vec![Message::system(prompt)]);
        let response = self.provider.chat(request).await?;

        let answer = truncate_chars(
            response.message.text_content().unwrap_or(""),
            MAX_RESPONSE_CHARS,
            "回答",
        );

        tracing::info!("查询完成，路径: {:?}", route);

        Ok(SupervisorResponse {
            answer,
            route,
            sources,
        })
    }

    fn build_prompt(
        question: &str,
        kb_documents: &[RetrievedDocument],
        web_response: Option<&WebSearchResponse>,
    ) -> String {
        let mut context_sections = Vec::new();

        if !kb_documents.is_empty() {
            let kb_block = kb_documents
                .iter()
                .map(|d| format!("[{}] (relevance {:.2}) {}", d.source, d.score, d.content))
                .collect::<Vec<_>>()
                .join("\n\n");
            context_sections.push(format!("Knowledge base results:\n{}", kb_block));
        }

        if let Some(web) = web_response {
            let mut web_block = web
                .results
                .iter()
                .map(|r| format!("[{}] {}\n{}", r.title, r.url, r.content))
                .collect::<Vec<_>>()
                .join("\n\n");
            if let Some(answer) = &web.answer {
                web_block = format!("Search engine summary: {}\n\n{}", answer, web_block);
            }
            context_sections.push(format!("Web search results:\n{}", web_block));
        }

        if context_sections.is_empty() {
            return format!(
                r#"Answer the user's question as accurately as you can. No retrieval context is available, so say clearly when you are unsure.

Question: {}"#,
                question
            );
        }

        format!(
            r#"Based on the following retrieved information, answer the user's question.

{}

Question: {}

Provide a clear, accurate answer based on the retrieved information. If the information is insufficient, state that clearly."#,
            context_sections.join("\n\n"),
            question
        )
    }
}

fn truncate_chars(text: &str, max_chars: usize, label: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    tracing::warn!("{} 过长，截断到 {} 字符", label, max_chars);
    let truncated: String = text.chars().take(max_chars).collect();
    if label == "回答" {
        format!("{}... [Response truncated due to length]", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;
    use veridoc_ai::RemoteEmbedding;
    use veridoc_vector::MemoryStore;

    fn retriever_with(provider: Arc<ScriptedProvider>) -> Arc<EmbeddingRetriever> {
        let embedder = Arc::new(RemoteEmbedding::new(provider, "test-embedding", 4));
        Arc::new(EmbeddingRetriever::new(
            embedder,
            Arc::new(MemoryStore::new()),
            5,
        ))
    }

    #[tokio::test]
    async fn test_knowledge_base_route_when_relevant() {
        let provider = Arc::new(ScriptedProvider::with_replies(&["answer from kb"]));
        let retriever = retriever_with(provider.clone());
        retriever
            .add_document("alpha doc about the topic", serde_json::json!({"source": "kb.md"}))
            .await
            .unwrap();

        let agent = SupervisorAgent::new(provider, "reason-model", retriever, None);
        // 查询与文档首字符相同 => 相似度 1.0，高于阈值
        let result = agent.process("alpha topic?").await.unwrap();

        assert_eq!(result.route, QueryRoute::KnowledgeBase);
        assert_eq!(result.answer, "answer from kb");
        assert_eq!(result.sources, vec!["kb.md".to_string()]);
    }

    #[tokio::test]
    async fn test_direct_route_when_empty_store_and_no_web() {
        let provider = Arc::new(ScriptedProvider::with_replies(&["best effort answer"]));
        let retriever = retriever_with(provider.clone());

        let agent = SupervisorAgent::new(provider, "reason-model", retriever, None);
        let result = agent.process("anything").await.unwrap();

        assert_eq!(result.route, QueryRoute::Direct);
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn test_low_relevance_without_web_still_uses_kb() {
        let provider = Arc::new(ScriptedProvider::with_replies(&["kb answer"]));
        let retriever = retriever_with(provider.clone());
        // 文档与查询首字符不同 => 相似度 0，低于阈值
        retriever
            .add_document("beta unrelated", serde_json::json!({"source": "b.md"}))
            .await
            .unwrap();

        let agent = SupervisorAgent::new(provider, "reason-model", retriever, None);
        let result = agent.process("alpha question").await.unwrap();

        // Web 未配置，知识库结果仍然作为上下文
        assert_eq!(result.route, QueryRoute::KnowledgeBase);
        assert_eq!(result.sources, vec!["b.md".to_string()]);
    }

    #[tokio::test]
    async fn test_long_question_truncated() {
        let provider = Arc::new(ScriptedProvider::with_replies(&["ok"]));
        let retriever = retriever_with(provider.clone());
        let agent = SupervisorAgent::new(provider, "reason-model", retriever, None);

        let long_question = "a".repeat(2000);
        let result = agent.process(&long_question).await.unwrap();
        assert_eq!(result.answer, "ok");
    }

    #[test]
    fn test_truncate_answer_appends_marker() {
        let long = "x".repeat(5000);
        let truncated = truncate_chars(&long, MAX_RESPONSE_CHARS, "回答");
        assert!(truncated.ends_with("[Response truncated due to length]"));
        assert!(truncated.chars().count() < 5000);
    }

    #[test]
    fn test_build_prompt_without_context() {
        let prompt = SupervisorAgent::build_prompt("q", &[], None);
        assert!(prompt.contains("No retrieval context is available"));
    }
}
