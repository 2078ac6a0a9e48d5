//! 文档字段抽取节点
//!
//! 把证件图片交给视觉模型，要求只输出结构化 JSON，
//! 再包装成供后续节点解析的分析文本。

use std::sync::Arc;

use veridoc_ai::{AiProvider, ChatRequest};
use veridoc_core::{Message, Result};

const EXTRACTION_INSTRUCTION: &str = "This is my birth certificate. Extract all the fields from \
this image and provide the information in a structured json only format, no other text or wrapper \
around json. The json will be read by machine. The fields include name, date of birth, place of \
birth. Make sure the output only contains JSON and nothing else. Be strict about it.";

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an expert birth certificate document processor. \
Extract and structure information from birth certificates, focusing on key verification fields \
including name, date of birth, and place of birth. Ensure accurate extraction of hospital or \
medical facility names for subsequent verification.";

pub struct DocumentExtractor {
    provider: Arc<dyn AiProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl DocumentExtractor {
    pub fn new(provider: Arc<dyn AiProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: Some(0.7),
            max_tokens: Some(1500),
        }
    }

    /// 抽取证件字段，返回追加到会话的助手消息
    pub async fn extract(
        &self,
        request_topic: &str,
        image_bytes: &[u8],
        media_type: &str,
    ) -> Result<Message> {
        let messages = vec![
            Message::system(EXTRACTION_SYSTEM_PROMPT),
            Message::user_with_image(EXTRACTION_INSTRUCTION, media_type, image_bytes),
        ];

        let mut request = ChatRequest::new(&self.model, messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let response = self.provider.chat(request).await?;
        let vision_json = response.message.text_content().unwrap_or("").trim().to_string();

        tracing::debug!("视觉模型抽取结果: {}", vision_json);

        let structured_response = format!(
            "Birth Certificate Analysis Request: {}\n\n\
             Extracted Birth Certificate Data (JSON):\n{}\n\n\
             Analysis: Based on the extracted birth certificate information, I need to verify the \
             authenticity of this document by validating the place of birth details. The extracted \
             data shows the place of birth as specified in the JSON above, which will be verified \
             against official hospital records and databases.",
            request_topic, vision_json
        );

        Ok(Message::assistant(structured_response))
    }
}
