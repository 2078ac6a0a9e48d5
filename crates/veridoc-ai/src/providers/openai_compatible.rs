//! OpenAI 兼容提供商通用实现
//!
//! 支持所有兼容 OpenAI API 格式的网关 (LiteLLM 代理、vLLM server 等)。
//! 文档抽取需要视觉输入，消息转换时将图片内容编码为 image_url 段。

use async_trait::async_trait;
use reqwest::header;
use veridoc_core::{Content, Message, Result, Role, VeriDocError};

use crate::providers::{AiProvider, ProviderConfig};
use crate::types::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason, TokenUsage,
};

/// OpenAI 兼容提供商
pub struct OpenAiCompatibleProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::new();
        Self { config, client }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or("")
    }

    /// 转换消息格式
    ///
    /// 纯文本消息 content 为字符串；带图片的消息 content 为分段数组，
    /// 图片编码为 data URL。
    fn convert_messages(&self, messages: Vec<Message>) -> Vec<serde_json::Value> {
        messages
            .into_iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };

                if m.has_image() {
                    let parts: Vec<serde_json::Value> = m
                        .content
                        .iter()
                        .map(|c| match c {
                            Content::Text { text } => serde_json::json!({
                                "type": "text",
                                "text": text,
                            }),
                            Content::Image { media_type, data } => serde_json::json!({
                                "type": "image_url",
                                "image_url": {
                                    "url": format!("data:{};base64,{}", media_type, data),
                                },
                            }),
                        })
                        .collect();

                    serde_json::json!({ "role": role, "content": parts })
                } else {
                    let content = m.text_content().unwrap_or("").to_string();
                    serde_json::json!({ "role": role, "content": content })
                }
            })
            .collect()
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url());

        let body = serde_json::json!({
            "model": request.model,
            "messages": self.convert_messages(request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key()))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| VeriDocError::Http(format!("{} API 请求失败: {}", self.config.name, e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VeriDocError::AiProvider(format!(
                "{} API 错误: {}",
                self.config.name, error_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VeriDocError::AiProvider(format!("解析响应失败: {}", e)))?;

        let choice = &json["choices"][0];
        let message_content = choice["message"]["content"].as_str().unwrap_or("").to_string();

        let finish_reason = match choice["finish_reason"].as_str() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some("stop") | None => FinishReason::Stop,
            Some(_) => FinishReason::Error,
        };

        let usage = TokenUsage::new(
            json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
        );

        Ok(ChatResponse {
            id: json["id"].as_str().unwrap_or("").to_string(),
            model: json["model"].as_str().unwrap_or("").to_string(),
            message: Message::assistant(&message_content),
            usage,
            finish_reason,
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        // 端点可能已经带 /embeddings 后缀
        let base = self.base_url();
        let url = if base.ends_with("/embeddings") {
            base.to_string()
        } else {
            format!("{}/embeddings", base)
        };

        let body = serde_json::json!({
            "model": request.model,
            "input": request.input,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key()))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                VeriDocError::Http(format!("{} Embedding API 请求失败: {}", self.config.name, e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VeriDocError::AiProvider(format!(
                "{} Embedding API 错误: {}",
                self.config.name, error_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VeriDocError::AiProvider(format!("解析响应失败: {}", e)))?;

        let embeddings: Vec<Vec<f32>> = json["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|item| item["embedding"].as_array())
                    .map(|emb| {
                        emb.iter()
                            .filter_map(|v| v.as_f64())
                            .map(|v| v as f32)
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();

        if embeddings.is_empty() {
            return Err(VeriDocError::AiProvider(
                "Embedding API 未返回有效向量".to_string(),
            ));
        }

        let usage = TokenUsage::new(json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize, 0);

        Ok(EmbeddingResponse {
            embeddings,
            model: json["model"].as_str().unwrap_or("").to_string(),
            usage,
        })
    }

    async fn models(&self) -> Result<Vec<String>> {
        Ok(vec![self.config.default_model.clone()])
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.api_key.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            ProviderConfig::new("litellm", "qwen-qwq-32b-preview")
                .with_api_key("sk-test")
                .with_base_url("http://localhost:4000/v1"),
        )
    }

    #[test]
    fn test_convert_text_messages() {
        let p = provider();
        let converted = p.convert_messages(vec![Message::system("be strict"), Message::user("hi")]);

        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[0]["content"], "be strict");
        assert_eq!(converted[1]["role"], "user");
    }

    #[test]
    fn test_convert_image_message_uses_parts() {
        let p = provider();
        let msg = Message::user_with_image("extract fields", "image/png", b"fakepng");
        let converted = p.convert_messages(vec![msg]);

        let parts = converted[0]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_base_url_fallback() {
        let p = OpenAiCompatibleProvider::new(ProviderConfig::new("openai", "gpt-4o"));
        assert_eq!(p.base_url(), "https://api.openai.com/v1");
    }
}
