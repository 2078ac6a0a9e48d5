//! 外部存储节点
//!
//! 抽取结果在核验前转发给外部存储服务。未配置端点时退化为
//! 本地 stub，直接报告成功。

use serde_json::json;
use veridoc_core::{Result, VeriDocError};

pub struct ArchiveClient {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl ArchiveClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: if endpoint.is_empty() { None } else { Some(endpoint) },
            client: reqwest::Client::new(),
        }
    }

    /// 转发抽取出的助手消息内容，返回存储服务的响应
    pub async fn store(&self, contents: &[String]) -> Result<serde_json::Value> {
        let Some(endpoint) = &self.endpoint else {
            tracing::info!("未配置存储端点，跳过外部存储 ({} 条消息)", contents.len());
            return Ok(json!({"result": "success"}));
        };

        let response = self
            .client
            .post(endpoint)
            .json(&json!({"messages": contents}))
            .send()
            .await
            .map_err(|e| VeriDocError::Http(format!("存储服务请求失败: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VeriDocError::Api(format!(
                "存储服务返回错误 ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VeriDocError::Api(format!("存储服务响应解析失败: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_without_endpoint() {
        let client = ArchiveClient::new("");
        let result = client.store(&["extracted data".to_string()]).await.unwrap();
        assert_eq!(result["result"], "success");
    }
}
