use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::service::{ChatTurn, ProcessRequest};

use super::error::ApiError;
use super::AppState;

const INDEX_HTML: &str = include_str!("static/index.html");

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.service.session_store();
    Json(json!({
        "status": "ok",
        "sessions": store.len(),
        "max_sessions": store.capacity(),
        "session_ttl_secs": store.ttl().as_secs(),
        "model": state.service.config().llm_model,
    }))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.service.available_models())
}

/// 처리 실패도 200과 함께 message로 전달
pub async fn process_profile(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessRequest>,
) -> impl IntoResponse {
    Json(state.service.process_profile(request).await)
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let history = state
        .service
        .chat(request.session_id.as_deref(), &request.query, request.history)
        .await;

    Json(json!({ "history": history }))
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "sessions": state.service.sessions() }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.service.end_session(&session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Session not found".to_string()))
    }
}
