//! 文档校验流水线
//!
//! 固定有向图：抽取 -> 存储 -> 核验 -> 反思 -> 路由 -> 审批。
//! 外部存储调用带有限重试，其余节点失败直接向上传播。

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use veridoc_ai::AiProvider;
use veridoc_core::{Config, Message, Result, Role};

use super::archive::ArchiveClient;
use super::extractor::DocumentExtractor;
use super::reflector::AssessmentReflector;
use super::registry::{FacilityRegistry, VerificationReport};
use super::router::{route_decision, Decision};
use super::score::extract_confidence;
use super::verifier::PlaceVerifier;

/// 触发校验的固定请求描述
pub const VERIFICATION_TOPIC: &str = "Verify the authenticity of this birth certificate by \
analyzing the document information and validating the place of birth details.";

const EXTERNAL_RESULT_PREFIX: &str = "External Processing Results:";

/// 流水线执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub decision: Decision,
    pub confidence: Option<f64>,
    /// 反思节点的原始评估文本
    pub assessment: String,
    pub report: VerificationReport,
    pub transcript: Vec<Message>,
}

pub struct VerificationPipeline {
    extractor: DocumentExtractor,
    archive: ArchiveClient,
    verifier: PlaceVerifier,
    reflector: AssessmentReflector,
    confidence_threshold: f64,
    node_retry_attempts: usize,
}

impl VerificationPipeline {
    pub fn new(provider: Arc<dyn AiProvider>, config: &Config) -> Self {
        Self {
            extractor: DocumentExtractor::new(provider.clone(), &config.ai.vision_model),
            archive: ArchiveClient::new(&config.pipeline.storage_endpoint),
            verifier: PlaceVerifier::new(FacilityRegistry::new()),
            reflector: AssessmentReflector::new(
                provider,
                &config.ai.reasoning_model,
                config.pipeline.reflection_attempts,
            ),
            confidence_threshold: config.pipeline.confidence_threshold,
            node_retry_attempts: config.pipeline.node_retry_attempts,
        }
    }

    /// 运行完整校验流程
    pub async fn run(&self, image_bytes: &[u8], media_type: &str) -> Result<VerificationOutcome> {
        let mut transcript = vec![Message::user(VERIFICATION_TOPIC)];

        // 抽取
        let extracted = self
            .extractor
            .extract(VERIFICATION_TOPIC, image_bytes, media_type)
            .await?;
        transcript.push(extracted);
        tracing::info!("文档字段抽取完成");

        // 存储 (外部调用，带重试)
        let assistant_texts: Vec<String> = transcript
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .filter_map(|m| m.text_content().map(String::from))
            .collect();

        let store_result = with_retry("store", self.node_retry_attempts, || {
            self.archive.store(&assistant_texts)
        })
        .await?;
        transcript.push(Message::user(format!(
            "{} {}",
            EXTERNAL_RESULT_PREFIX,
            serde_json::to_string_pretty(&store_result)?
        )));

        // 出生地核验
        let report = self.verifier.verify(&transcript);
        transcript.push(Message::user(format!(
            "{} {}",
            EXTERNAL_RESULT_PREFIX,
            serde_json::to_string_pretty(&report)?
        )));
        tracing::info!(
            "出生地核验完成: verified={} score={}",
            report.place_verified,
            report.confidence_score
        );

        // 反思评估
        let assessment = self.reflector.reflect(&transcript).await?;
        transcript.push(Message::user(assessment.clone()));

        // 路由
        let confidence = extract_confidence(&assessment).map(|(score, _)| score);
        let decision = route_decision(confidence, self.confidence_threshold);

        match decision {
            Decision::AutomaticApproval => {
                tracing::info!("出生证明通过自动审批");
            }
            Decision::HumanReview => {
                tracing::info!("出生证明转人工复核");
            }
        }

        Ok(VerificationOutcome {
            decision,
            confidence,
            assessment,
            report,
            transcript,
        })
    }
}

/// 有限重试，全部失败时返回最后一个错误
async fn with_retry<T, F, Fut>(name: &str, attempts: usize, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!("节点 {} 第 {}/{} 次尝试失败: {}", name, attempt, attempts, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.expect("retry loop ran at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;
    use veridoc_core::VeriDocError;

    fn pipeline_with(provider: Arc<ScriptedProvider>) -> VerificationPipeline {
        let mut config = Config::default();
        config.ai.api_key = "sk-test".to_string();
        VerificationPipeline::new(provider, &config)
    }

    #[tokio::test]
    async fn test_full_run_auto_approval() {
        let provider = Arc::new(ScriptedProvider::with_replies(&[
            // 视觉模型抽取输出
            r#"{"name": "Jane Doe", "date_of_birth": "1994-03-02", "place_of_birth": "Armidale and New England Hospital"}"#,
            // 反思评估输出
            r#"{"confidence_score": 0.9, "message": "Hospital verified with high confidence"}"#,
        ]));

        let outcome = pipeline_with(provider)
            .run(b"fake png bytes", "image/png")
            .await
            .unwrap();

        assert_eq!(outcome.decision, Decision::AutomaticApproval);
        assert_eq!(outcome.confidence, Some(0.9));
        assert!(outcome.report.place_verified);
        assert_eq!(outcome.report.confidence_score, 0.95);
        // 话题 + 抽取 + 存储结果 + 核验结果 + 评估
        assert_eq!(outcome.transcript.len(), 5);
    }

    #[tokio::test]
    async fn test_unknown_place_routes_to_human() {
        let provider = Arc::new(ScriptedProvider::with_replies(&[
            r#"{"name": "John Doe", "place_of_birth": "Saint Nowhere Clinic"}"#,
            r#"{"confidence_score": 0.3, "message": "Place not found in registry"}"#,
        ]));

        let outcome = pipeline_with(provider)
            .run(b"fake png bytes", "image/png")
            .await
            .unwrap();

        assert_eq!(outcome.decision, Decision::HumanReview);
        assert!(!outcome.report.place_verified);
    }

    #[tokio::test]
    async fn test_unparseable_assessment_defaults_to_human() {
        let provider = Arc::new(ScriptedProvider::with_replies(&[
            r#"{"place_of_birth": "Westmead Hospital"}"#,
            // 三次反思输出都不含分数
            "I cannot produce JSON",
            "still no json here",
            "definitely prose",
        ]));

        let outcome = pipeline_with(provider)
            .run(b"fake png bytes", "image/png")
            .await
            .unwrap();

        assert_eq!(outcome.confidence, None);
        assert_eq!(outcome.decision, Decision::HumanReview);
    }

    #[tokio::test]
    async fn test_with_retry_eventually_succeeds() {
        let mut calls = 0;
        let result: Result<u32> = with_retry("flaky", 3, || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(VeriDocError::Http("transient".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts() {
        let result: Result<u32> = with_retry("dead", 2, || async {
            Err(VeriDocError::Http("down".to_string()))
        })
        .await;

        assert!(result.is_err());
    }
}
