//! 审批路由
//!
//! 反思评估的置信度决定走自动审批还是人工复核。
//! 解析不出分数时一律人工复核。

use serde::{Deserialize, Serialize};

/// 审批决策
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AutomaticApproval,
    HumanReview,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::AutomaticApproval => write!(f, "automatic_approval"),
            Decision::HumanReview => write!(f, "human_review"),
        }
    }
}

/// 阈值路由
pub fn route_decision(confidence: Option<f64>, threshold: f64) -> Decision {
    match confidence {
        Some(score) => {
            if score >= threshold {
                tracing::info!("置信度 {} >= {}，自动审批", score, threshold);
                Decision::AutomaticApproval
            } else {
                tracing::info!("置信度 {} < {}，转人工复核", score, threshold);
                Decision::HumanReview
            }
        }
        None => {
            tracing::warn!("反思结果中未找到置信度分数，默认转人工复核");
            Decision::HumanReview
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f64 = 0.75;

    #[test]
    fn test_high_confidence_auto_approves() {
        assert_eq!(
            route_decision(Some(0.9), THRESHOLD),
            Decision::AutomaticApproval
        );
    }

    #[test]
    fn test_threshold_boundary_is_automatic() {
        assert_eq!(
            route_decision(Some(0.75), THRESHOLD),
            Decision::AutomaticApproval
        );
    }

    #[test]
    fn test_low_confidence_goes_to_human() {
        assert_eq!(route_decision(Some(0.74), THRESHOLD), Decision::HumanReview);
        assert_eq!(route_decision(Some(0.2), THRESHOLD), Decision::HumanReview);
    }

    #[test]
    fn test_missing_score_defaults_to_human() {
        assert_eq!(route_decision(None, THRESHOLD), Decision::HumanReview);
    }
}
