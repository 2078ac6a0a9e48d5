//! 置信度分数解析
//!
//! 反思模型被要求输出 `{"confidence_score": 0.XX, "message": "..."}`，
//! 实际输出常混入思考标签、markdown 围栏或纯文本。解析按三级回退：
//! 严格 JSON 对象 -> 键值对正则 -> 裸小数。

use once_cell::sync::Lazy;
use regex::Regex;

/// 完整 JSON 对象 (confidence_score 与 message 同时出现)
pub(crate) static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{[^{}]*"confidence_score"[^{}]*"message"[^{}]*\}"#).expect("invalid regex")
});

static SCORE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""confidence_score":\s*([0-9]*\.?[0-9]+)"#).expect("invalid regex"));

static MESSAGE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""message":\s*"([^"]*)""#).expect("invalid regex"));

static BARE_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(0\.[0-9]+|1\.0+|0)\b").expect("invalid regex"));

/// 预处理：去掉 <think> 思考段 (取最后一个 </think> 之后的内容) 和
/// markdown 代码围栏
pub fn clean_response(text: &str) -> String {
    let mut cleaned = text.trim().to_string();

    if cleaned.contains("<think>") && cleaned.contains("</think>") {
        if let Some(pos) = cleaned.rfind("</think>") {
            cleaned = cleaned[pos + "</think>".len()..].trim().to_string();
        }
    }

    cleaned.replace("```json", "").replace("```", "").trim().to_string()
}

/// 从自由文本里提取置信度分数与说明
pub fn extract_confidence(text: &str) -> Option<(f64, String)> {
    let cleaned = clean_response(text);

    // 第一级：完整 JSON 对象
    if let Some(m) = JSON_OBJECT.find(&cleaned) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(m.as_str()) {
            if let Some(score) = value.get("confidence_score").and_then(|v| v.as_f64()) {
                let message = value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                return Some((score, message));
            }
        }
    }

    // 第二级：直接取 confidence_score 键值
    if let Some(caps) = SCORE_FIELD.captures(&cleaned) {
        if let Ok(score) = caps[1].parse::<f64>() {
            let message = MESSAGE_FIELD
                .captures(&cleaned)
                .map(|c| c[1].to_string())
                .unwrap_or_default();
            return Some((score, message));
        }
    }

    // 第三级：任何落在 [0,1] 的裸小数
    for caps in BARE_DECIMAL.captures_iter(&cleaned) {
        if let Ok(num) = caps[1].parse::<f64>() {
            if (0.0..=1.0).contains(&num) {
                return Some((num, String::new()));
            }
        }
    }

    None
}

/// 响应是否已经是合规的 JSON 评估结果
pub fn is_valid_assessment(text: &str) -> bool {
    if !(text.contains(r#""confidence_score""#) && text.contains(r#""message""#)) {
        return false;
    }
    JSON_OBJECT
        .find(text)
        .map(|m| serde_json::from_str::<serde_json::Value>(m.as_str()).is_ok())
        .unwrap_or(false)
}
