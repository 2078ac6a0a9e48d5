//! HTTP API 路由
//!
//! REST 端点：/health /query /embed /status /verify。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use veridoc_core::{Result, VeriDocError};

use crate::docverify::{Decision, VerificationReport};
use crate::state::AppState;

/// API 错误响应
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<VeriDocError> for ApiError {
    fn from(e: VeriDocError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "status": "error",
            "detail": self.detail,
        }));
        (self.status, body).into_response()
    }
}

/// 创建完整 API 路由
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(service_banner))
        .route("/health", get(health_check))
        .route("/query", post(query_handler))
        .route("/embed", post(embed_handler))
        .route("/status", get(status_handler))
        .route("/verify", post(verify_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动 HTTP 服务
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    state.probe_services().await;

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .map_err(|e| VeriDocError::Config(format!("非法的监听地址: {}", e)))?;

    let app = create_router(state);

    tracing::info!("VeriDoc server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| VeriDocError::Config(format!("绑定地址失败: {}", e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| VeriDocError::Unknown(e.to_string()))?;

    Ok(())
}

#[derive(Serialize)]
struct BannerResponse {
    service: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

async fn service_banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        service: "VeriDoc",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec!["/health", "/query", "/embed", "/status", "/verify"],
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HashMap<String, String>,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: state.service_status().await,
    })
}

/// 查询请求
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub session_id: Option<String>,
}

/// 查询响应
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub session_id: Option<String>,
    pub route: crate::agents::QueryRoute,
    pub sources: Vec<String>,
    pub processing_time: f64,
    pub status: String,
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> std::result::Result<Json<QueryResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let started = Instant::now();
    let result = state.supervisor.process(&request.question).await?;

    Ok(Json(QueryResponse {
        response: result.answer,
        session_id: request.session_id,
        route: result.route,
        sources: result.sources,
        processing_time: started.elapsed().as_secs_f64(),
        status: "success".to_string(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmbedRequest {
    pub force_refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    pub status: String,
    pub summary: crate::agents::EmbedSummary,
    pub processing_time: f64,
}

async fn embed_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EmbedRequest>,
) -> std::result::Result<Json<EmbedResponse>, ApiError> {
    let started = Instant::now();
    let summary = state.knowledge.embed_knowledge(request.force_refresh).await?;

    Ok(Json(EmbedResponse {
        status: "success".to_string(),
        summary,
        processing_time: started.elapsed().as_secs_f64(),
    }))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<HashMap<String, String>> {
    state.probe_services().await;
    Json(state.service_status().await)
}

/// 校验请求：二选一，base64 图片或服务器本地路径
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    pub image_base64: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub decision: Decision,
    pub confidence: Option<f64>,
    pub assessment: String,
    pub report: VerificationReport,
    pub processing_time: f64,
    pub status: String,
}

async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> std::result::Result<Json<VerifyResponse>, ApiError> {
    let started = Instant::now();

    let (image_bytes, media_type) = match (&request.image_base64, &request.image_path) {
        (Some(encoded), _) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ApiError::bad_request(format!("invalid base64 image: {}", e)))?;
            (bytes, "image/png".to_string())
        }
        (None, Some(path)) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| ApiError::bad_request(format!("cannot read image {}: {}", path, e)))?;
            (bytes, media_type_for(path))
        }
        (None, None) => {
            return Err(ApiError::bad_request(
                "either image_base64 or image_path is required",
            ));
        }
    };

    let outcome = state.pipeline.run(&image_bytes, &media_type).await?;

    Ok(Json(VerifyResponse {
        decision: outcome.decision,
        confidence: outcome.confidence,
        assessment: outcome.assessment,
        report: outcome.report,
        processing_time: started.elapsed().as_secs_f64(),
        status: "success".to_string(),
    }))
}

fn media_type_for(path: &str) -> String {
    match path.rsplit('.').next().map(|e| e.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg".to_string(),
        _ => "image/png".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("cert.jpg"), "image/jpeg");
        assert_eq!(media_type_for("cert.JPEG"), "image/jpeg");
        assert_eq!(media_type_for("cert.png"), "image/png");
        assert_eq!(media_type_for("noext"), "image/png");
    }

    #[test]
    fn test_embed_request_defaults() {
        let request: EmbedRequest = serde_json::from_str("{}").unwrap();
        assert!(!request.force_refresh);
    }

    #[test]
    fn test_verify_request_accepts_either_field() {
        let request: VerifyRequest =
            serde_json::from_str(r#"{"image_path": "/tmp/cert.png"}"#).unwrap();
        assert!(request.image_base64.is_none());
        assert_eq!(request.image_path.as_deref(), Some("/tmp/cert.png"));
    }

    #[test]
    fn test_query_response_serializes() {
        let response = QueryResponse {
            response: "answer".to_string(),
            session_id: Some("s1".to_string()),
            route: crate::agents::QueryRoute::KnowledgeBase,
            sources: vec!["kb.md".to_string()],
            processing_time: 0.42,
            status: "success".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["route"], "knowledge_base");
        assert_eq!(json["status"], "success");
    }
}
