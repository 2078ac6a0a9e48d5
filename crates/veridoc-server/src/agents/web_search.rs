//! Web 搜索工具 (Tavily 兼容 API)
//!
//! 知识库召回不足时的补充检索来源。

use serde::{Deserialize, Serialize};
use veridoc_core::{Result, VeriDocError};

/// 单条搜索结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub score: f32,
}

/// 搜索响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchResponse {
    pub query: String,
    pub results: Vec<WebSearchHit>,
    #[serde(default)]
    pub answer: Option<String>,
}

pub struct WebSearchTool {
    endpoint: String,
    api_key: String,
    max_results: usize,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, max_results: usize) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_results,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.endpoint.is_empty()
    }

    /// 执行搜索
    pub async fn search(&self, query: &str) -> Result<WebSearchResponse> {
        let url = format!("{}/search", self.endpoint);

        let payload = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": "basic",
            "max_results": self.max_results,
            "include_answer": true,
        });

        tracing::debug!("Web 搜索: {}", query);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| VeriDocError::Http(format!("Web 搜索请求失败: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VeriDocError::Api(format!(
                "Web 搜索服务返回错误 ({}): {}",
                status, body
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VeriDocError::Api(format!("Web 搜索响应解析失败: {}", e)))?;

        Ok(Self::parse_response(query, &json))
    }

    fn parse_response(query: &str, json: &serde_json::Value) -> WebSearchResponse {
        let results = json["results"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .map(|r| WebSearchHit {
                        title: r["title"].as_str().unwrap_or("").to_string(),
                        url: r["url"].as_str().unwrap_or("").to_string(),
                        content: r["content"].as_str().unwrap_or("").to_string(),
                        score: r["score"].as_f64().unwrap_or(0.0) as f32,
                    })
                    .collect()
            })
            .unwrap_or_default();

        WebSearchResponse {
            query: query.to_string(),
            results,
            answer: json["answer"].as_str().map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response() {
        let payload = json!({
            "answer": "Rust is a systems language.",
            "results": [
                {"title": "Rust", "url": "https://rust-lang.org", "content": "About Rust", "score": 0.97},
                {"title": "Book", "url": "https://doc.rust-lang.org/book", "content": "The book"}
            ]
        });

        let parsed = WebSearchTool::parse_response("what is rust", &payload);
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title, "Rust");
        assert!((parsed.results[0].score - 0.97).abs() < 1e-6);
        // score 缺省为 0
        assert_eq!(parsed.results[1].score, 0.0);
        assert_eq!(parsed.answer.as_deref(), Some("Rust is a systems language."));
    }

    #[test]
    fn test_parse_empty_response() {
        let parsed = WebSearchTool::parse_response("q", &json!({}));
        assert!(parsed.results.is_empty());
        assert!(parsed.answer.is_none());
    }

    #[test]
    fn test_is_configured() {
        assert!(WebSearchTool::new("https://api.tavily.com", "tvly-key", 5).is_configured());
        assert!(!WebSearchTool::new("https://api.tavily.com", "", 5).is_configured());
    }
}
