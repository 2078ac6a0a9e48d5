//! 反思评估节点
//!
//! 第二个模型基于核验结果给出合法性评估，要求输出严格 JSON。
//! 模型经常不守格式，这里最多尝试三次，逐次加码指令，
//! 全部失败时回退到人工复核兜底分数。

use std::sync::Arc;

use veridoc_ai::{AiProvider, ChatRequest};
use veridoc_core::{swap_roles, Message, Result};

use super::score::is_valid_assessment;

const ASSESSMENT_SYSTEM_PROMPT: &str = r#"You are an expert birth certificate verification assessor. Your task is to evaluate birth certificate legitimacy based on place of birth verification results.

ASSESSMENT CRITERIA:
1. PRIMARY FACTOR - Hospital/Place Verification:
   - If place_verified=true and confidence_score >= 0.90: High confidence (0.85-0.95)
   - If place_verified=true and confidence_score 0.80-0.89: Good confidence (0.75-0.84)
   - If place_verified=true and confidence_score 0.70-0.79: Moderate confidence (0.65-0.74)
   - If place_verified=false or confidence_score < 0.70: Low confidence (0.20-0.40)

2. SUPPORTING FACTORS (adjust +/- 0.05):
   - Hospital status (Active vs Inactive)
   - Verification sources quality
   - Contact information availability

CRITICAL: You must respond with ONLY a valid JSON object in this exact format:
{"confidence_score": 0.XX, "message": "explanation here"}

Do not include any other text, thinking, or formatting. Just the JSON object."#;

const EXPLICIT_RETRY_INSTRUCTION: &str = r#"Please respond with ONLY a JSON object in this exact format: {"confidence_score": 0.XX, "message": "your explanation"}. No other text."#;

pub const FALLBACK_ASSESSMENT: &str = r#"{"confidence_score": 0.5, "message": "Unable to complete automated assessment due to processing error. Manual review recommended."}"#;

pub struct AssessmentReflector {
    provider: Arc<dyn AiProvider>,
    model: String,
    max_attempts: usize,
}

impl AssessmentReflector {
    pub fn new(provider: Arc<dyn AiProvider>, model: impl Into<String>, max_attempts: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// 对当前会话做反思评估，返回评估文本 (尽力保证为 JSON)
    pub async fn reflect(&self, transcript: &[Message]) -> Result<String> {
        // 角色互换：模型前几步的输出以用户口吻重新进入模型
        let mut conversation = vec![Message::system(ASSESSMENT_SYSTEM_PROMPT)];
        conversation.extend(swap_roles(transcript));

        let mut last_response = String::new();

        for attempt in 1..=self.max_attempts {
            let request = ChatRequest::new(&self.model, conversation.clone())
                .with_temperature(0.0)
                .with_max_tokens(1000);

            match self.provider.chat(request).await {
                Ok(response) => {
                    let content = response.message.text_content().unwrap_or("").trim().to_string();
                    let preview: String = content.chars().take(200).collect();
                    tracing::debug!("反思第 {} 次尝试: {}", attempt, preview);

                    if is_valid_assessment(&content) {
                        tracing::info!("第 {} 次尝试得到合规 JSON 评估", attempt);
                        return Ok(content);
                    }

                    last_response = content;
                    if attempt < self.max_attempts {
                        tracing::warn!("第 {} 次尝试输出不合规，追加显式指令重试", attempt);
                        conversation.push(Message::user(EXPLICIT_RETRY_INSTRUCTION));
                    }
                }
                Err(e) => {
                    tracing::error!("反思第 {} 次尝试失败: {}", attempt, e);
                    if attempt == self.max_attempts {
                        return Ok(FALLBACK_ASSESSMENT.to_string());
                    }
                }
            }
        }

        // 所有尝试都拿到了文本但都不合规：沿用最后一次输出，
        // 下游解析器自会回退到人工复核
        Ok(last_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;

    fn transcript() -> Vec<Message> {
        vec![
            Message::user("Verify the authenticity of this birth certificate."),
            Message::assistant("Extracted Birth Certificate Data (JSON): {...}"),
            Message::user("External Processing Results: {\"place_verified\": true}"),
        ]
    }

    #[tokio::test]
    async fn test_valid_on_first_attempt() {
        let provider = Arc::new(ScriptedProvider::with_replies(&[
            r#"{"confidence_score": 0.88, "message": "registry match"}"#,
        ]));
        let reflector = AssessmentReflector::new(provider.clone(), "reflect-model", 3);

        let result = reflector.reflect(&transcript()).await.unwrap();
        assert!(result.contains("0.88"));
        assert_eq!(provider.request_message_counts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_appends_explicit_instruction() {
        let provider = Arc::new(ScriptedProvider::with_replies(&[
            "Sure! The document looks mostly fine to me.",
            r#"{"confidence_score": 0.8, "message": "ok"}"#,
        ]));
        let reflector = AssessmentReflector::new(provider.clone(), "reflect-model", 3);

        let result = reflector.reflect(&transcript()).await.unwrap();
        assert!(result.contains("0.8"));

        let counts = provider.request_message_counts.lock().unwrap();
        assert_eq!(counts.len(), 2);
        // 第二次请求比第一次多一条显式指令
        assert_eq!(counts[1], counts[0] + 1);
    }

    #[tokio::test]
    async fn test_provider_error_on_final_attempt_returns_fallback() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err("gateway timeout".to_string()),
            Err("gateway timeout".to_string()),
            Err("gateway timeout".to_string()),
        ]));
        let reflector = AssessmentReflector::new(provider, "reflect-model", 3);

        let result = reflector.reflect(&transcript()).await.unwrap();
        assert_eq!(result, FALLBACK_ASSESSMENT);
    }

    #[tokio::test]
    async fn test_all_invalid_keeps_last_response() {
        let provider = Arc::new(ScriptedProvider::with_replies(&[
            "first rambling answer",
            "second rambling answer",
            "final rambling answer",
        ]));
        let reflector = AssessmentReflector::new(provider, "reflect-model", 3);

        let result = reflector.reflect(&transcript()).await.unwrap();
        assert_eq!(result, "final rambling answer");
    }
}
