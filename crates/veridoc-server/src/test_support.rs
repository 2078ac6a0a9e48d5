//! 测试辅助：脚本化的 AI 提供商

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use veridoc_ai::{
    AiProvider, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason,
    TokenUsage,
};
use veridoc_core::{Message, Result, VeriDocError};

/// 按队列顺序返回预设响应的提供商
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    /// 每次 chat 请求的消息条数，用于断言重试时追加了指令
    pub request_message_counts: Mutex<Vec<usize>>,
    embedding_dimension: usize,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            request_message_counts: Mutex::new(Vec::new()),
            embedding_dimension: 4,
        }
    }

    pub fn with_replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.request_message_counts
            .lock()
            .unwrap()
            .push(request.messages.len());

        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err("script exhausted".to_string()));

        match next {
            Ok(text) => Ok(ChatResponse {
                id: "scripted".to_string(),
                model: request.model,
                message: Message::assistant(text),
                usage: TokenUsage::new(0, 0),
                finish_reason: FinishReason::Stop,
            }),
            Err(e) => Err(VeriDocError::AiProvider(e)),
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        // 文本首字节决定向量方向，保证检索测试可控
        let embeddings = request
            .input
            .iter()
            .map(|text| {
                let seed = text.bytes().next().unwrap_or(0) as f32;
                let mut v = vec![0.0; self.embedding_dimension];
                v[(seed as usize) % self.embedding_dimension] = 1.0;
                v
            })
            .collect();

        Ok(EmbeddingResponse {
            embeddings,
            model: request.model,
            usage: TokenUsage::new(0, 0),
        })
    }

    async fn models(&self) -> Result<Vec<String>> {
        Ok(vec!["scripted".to_string()])
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
