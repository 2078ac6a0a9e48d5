//! 出生地抽取与外部核验
//!
//! 从抽取节点的模型输出里定位出生地字段：优先 JSON 键，
//! 其次若干医院名称的文本模式，最后交给登记表核验。

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use veridoc_core::{Message, Role};

use super::registry::{FacilityRegistry, VerificationReport};

static JSON_PLACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""place_of_birth"\s*:\s*"([^"]+)""#).expect("invalid regex"));

// 自由文本里的医院名模式，按特异性从高到低
static HOSPITAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"Armidale and New England Hospital[,\s]*Armidale",
        r"New England Hospital[,\s]*Armidale",
        r#"place of birth[^:]*:\s*"?([^".\n]+(?:Hospital|Medical|Centre)[^".\n]*)"?"#,
        r#"stated as\s*"([^"]+Hospital[^"]*)""#,
        r#"birth[^:]*:\s*"?([^".\n]*Hospital[^".\n]*)"?"#,
    ]
    .iter()
    .map(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("invalid regex")
    })
    .collect()
});

static TRAILING_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\s]+$").expect("invalid regex"));

/// 从单段文本中提取出生地
pub fn extract_place_of_birth(content: &str) -> Option<String> {
    if let Some(caps) = JSON_PLACE.captures(content) {
        return Some(caps[1].trim().to_string());
    }

    for pattern in HOSPITAL_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(content) {
            let raw = caps
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_else(|| caps.get(0).map(|m| m.as_str()).unwrap_or(""));
            let place = TRAILING_JUNK.replace(raw.trim(), "").to_string();
            if !place.is_empty() {
                return Some(place);
            }
        }
    }

    None
}

/// 出生地核验器
pub struct PlaceVerifier {
    registry: FacilityRegistry,
}

impl PlaceVerifier {
    pub fn new(registry: FacilityRegistry) -> Self {
        Self { registry }
    }

    /// 在助手消息里查找出生地并核验
    pub fn verify(&self, messages: &[Message]) -> VerificationReport {
        let place = messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .filter_map(|m| m.text_content())
            .find_map(extract_place_of_birth);

        match place {
            Some(place) => {
                tracing::info!("核验出生地: {}", place);
                self.registry.verify_place(&place)
            }
            None => {
                tracing::warn!("未能从文档数据中提取出生地");
                VerificationReport::missing_place()
            }
        }
    }
}

impl Default for PlaceVerifier {
    fn default() -> Self {
        Self::new(FacilityRegistry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_extraction() {
        let content = r#"Extracted data: {"name": "Jane Doe", "date_of_birth": "1994-03-02", "place_of_birth": "Armidale and New England Hospital"}"#;
        assert_eq!(
            extract_place_of_birth(content).as_deref(),
            Some("Armidale and New England Hospital")
        );
    }

    #[test]
    fn test_place_of_birth_prose_pattern() {
        let content = r#"The place of birth is listed as: "Westmead Hospital""#;
        assert_eq!(
            extract_place_of_birth(content).as_deref(),
            Some("Westmead Hospital")
        );
    }

    #[test]
    fn test_stated_as_pattern() {
        let content = r#"The birth location is stated as "Royal North Shore Hospital" in the record"#;
        assert_eq!(
            extract_place_of_birth(content).as_deref(),
            Some("Royal North Shore Hospital")
        );
    }

    #[test]
    fn test_known_hospital_literal_pattern() {
        let content = "Child was born at Armidale and New England Hospital, Armidale in 1994";
        let place = extract_place_of_birth(content).unwrap();
        assert!(place.starts_with("Armidale and New England Hospital"));
    }

    #[test]
    fn test_no_place_found() {
        assert!(extract_place_of_birth("name and date of birth only").is_none());
    }

    #[test]
    fn test_verify_searches_assistant_messages_only() {
        let verifier = PlaceVerifier::default();
        let messages = vec![
            Message::user(r#"ignore this: "place_of_birth": "Fake Clinic""#),
            Message::assistant(r#"{"place_of_birth": "Westmead Hospital"}"#),
        ];

        let report = verifier.verify(&messages);
        assert!(report.place_verified);
        assert_eq!(report.input_data, "Westmead Hospital");
    }

    #[test]
    fn test_verify_without_place_reports_error() {
        let verifier = PlaceVerifier::default();
        let messages = vec![Message::assistant("no location data present")];

        let report = verifier.verify(&messages);
        assert!(!report.place_verified);
        assert_eq!(report.confidence_score, 0.0);
        assert!(report.error.is_some());
    }
}
