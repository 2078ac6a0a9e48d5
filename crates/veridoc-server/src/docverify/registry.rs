//! 医疗机构登记表
//!
//! 出生地核验用的已知医院数据，进程内只读。匹配分三档：
//! 精确命中 0.95，包含式部分命中 0.90，未命中 0.20。

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 机构档案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub official_name: String,
    pub location: String,
    pub facility_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub established: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub verification_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// 核验报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verification_type: String,
    pub input_data: String,
    pub place_verified: bool,
    pub confidence_score: f64,
    pub verification_result: serde_json::Value,
    pub verification_notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_factors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationReport {
    /// 无法从文档中定位出生地时的报告
    pub fn missing_place() -> Self {
        Self {
            verification_type: "place_of_birth".to_string(),
            input_data: String::new(),
            place_verified: false,
            confidence_score: 0.0,
            verification_result: serde_json::Value::Null,
            verification_notes: vec![
                "Unable to extract place of birth from document".to_string()
            ],
            risk_factors: None,
            error: Some("No place of birth information found in the provided data".to_string()),
        }
    }
}

// BTreeMap 保证部分匹配遍历顺序稳定
static KNOWN_FACILITIES: Lazy<BTreeMap<&'static str, FacilityRecord>> = Lazy::new(|| {
    let mut m = BTreeMap::new();

    m.insert(
        "armidale and new england hospital",
        FacilityRecord {
            official_name: "Armidale and New England Hospital".to_string(),
            location: "Armidale, New South Wales, Australia".to_string(),
            facility_type: "Public Hospital".to_string(),
            status: "Active".to_string(),
            established: Some("1950s".to_string()),
            coordinates: Some(Coordinates {
                latitude: -30.5136,
                longitude: 151.6669,
            }),
            postal_code: Some("2350".to_string()),
            phone: Some("+61 2 6776 8888".to_string()),
            website: Some("https://www.health.nsw.gov.au/".to_string()),
            services: vec![
                "Emergency".to_string(),
                "Maternity".to_string(),
                "General Medicine".to_string(),
                "Surgery".to_string(),
            ],
            verification_sources: vec![
                "NSW Health Directory".to_string(),
                "Australian Hospital Association".to_string(),
                "Google Maps verification".to_string(),
            ],
        },
    );

    m.insert(
        "royal north shore hospital",
        FacilityRecord {
            official_name: "Royal North Shore Hospital".to_string(),
            location: "St Leonards, New South Wales, Australia".to_string(),
            facility_type: "Public Hospital".to_string(),
            status: "Active".to_string(),
            established: None,
            coordinates: None,
            postal_code: None,
            phone: None,
            website: None,
            services: vec![],
            verification_sources: vec![],
        },
    );

    m.insert(
        "westmead hospital",
        FacilityRecord {
            official_name: "Westmead Hospital".to_string(),
            location: "Westmead, New South Wales, Australia".to_string(),
            facility_type: "Public Hospital".to_string(),
            status: "Active".to_string(),
            established: None,
            coordinates: None,
            postal_code: None,
            phone: None,
            website: None,
            services: vec![],
            verification_sources: vec![],
        },
    );

    m
});

const LOCATION_SUFFIXES: [&str; 4] = [", armidale", ", new south wales", ", nsw", ", australia"];

/// 医疗机构登记表
pub struct FacilityRegistry;

impl FacilityRegistry {
    pub fn new() -> Self {
        Self
    }

    /// 规范化输入：小写、去空白、剥离常见地名后缀
    fn normalize(place: &str) -> String {
        let mut normalized = place.to_lowercase().trim().to_string();
        for suffix in LOCATION_SUFFIXES {
            normalized = normalized.replace(suffix, "");
        }
        normalized
    }

    fn verified_result(place: &str, record: &FacilityRecord) -> serde_json::Value {
        serde_json::json!({
            "input_place": place,
            "verified_name": record.official_name,
            "location": record.location,
            "type": record.facility_type,
            "status": record.status,
            "established": record.established.as_deref().unwrap_or("Unknown"),
            "coordinates": record.coordinates,
            "contact_info": {
                "phone": record.phone.as_deref().unwrap_or("Not available"),
                "website": record.website.as_deref().unwrap_or("Not available"),
            },
            "services": record.services,
            "verification_sources": record.verification_sources,
        })
    }

    fn verified_notes(record: &FacilityRecord, partial: bool) -> Vec<String> {
        let mut notes = vec![
            format!(
                "Hospital '{}' is a verified medical facility",
                record.official_name
            ),
            format!("Located in {}", record.location),
            "Facility is currently active and operational".to_string(),
            "Information cross-referenced with official health directories".to_string(),
        ];
        if partial {
            notes.push(
                "Matched via partial name matching (input contained location suffix)".to_string(),
            );
        }
        notes
    }

    /// 核验出生地
    pub fn verify_place(&self, place: &str) -> VerificationReport {
        let normalized = Self::normalize(place);

        // 精确匹配
        if let Some(record) = KNOWN_FACILITIES.get(normalized.as_str()) {
            return VerificationReport {
                verification_type: "place_of_birth".to_string(),
                input_data: place.to_string(),
                place_verified: true,
                confidence_score: 0.95,
                verification_result: Self::verified_result(place, record),
                verification_notes: Self::verified_notes(record, false),
                risk_factors: None,
                error: None,
            };
        }

        // 包含式部分匹配 (双向)
        for (key, record) in KNOWN_FACILITIES.iter() {
            if normalized.contains(key) || key.contains(normalized.as_str()) {
                return VerificationReport {
                    verification_type: "place_of_birth".to_string(),
                    input_data: place.to_string(),
                    place_verified: true,
                    confidence_score: 0.90,
                    verification_result: Self::verified_result(place, record),
                    verification_notes: Self::verified_notes(record, true),
                    risk_factors: None,
                    error: None,
                };
            }
        }

        // 未命中：收集弱相关的候选供人工参考
        let input_words: Vec<&str> = normalized.split_whitespace().collect();
        let partial_matches: Vec<serde_json::Value> = KNOWN_FACILITIES
            .iter()
            .filter(|(key, _)| {
                key.split_whitespace().any(|w| input_words.contains(&w))
                    || input_words.iter().any(|w| key.contains(w))
            })
            .map(|(_, record)| {
                serde_json::json!({
                    "name": record.official_name,
                    "location": record.location,
                })
            })
            .collect();

        VerificationReport {
            verification_type: "place_of_birth".to_string(),
            input_data: place.to_string(),
            place_verified: false,
            confidence_score: 0.2,
            verification_result: serde_json::json!({
                "input_place": place,
                "status": "Not found in verified database",
                "partial_matches": partial_matches,
            }),
            verification_notes: vec![
                format!("Place '{}' not found in verified hospital database", place),
                "This could indicate a non-existent location or outdated information".to_string(),
                "Manual verification recommended for unknown locations".to_string(),
            ],
            risk_factors: Some(vec![
                "Unverified birth location".to_string(),
                "Potential fraudulent document if location doesn't exist".to_string(),
                "Requires additional verification through official channels".to_string(),
            ]),
            error: None,
        }
    }
}

impl Default for FacilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
