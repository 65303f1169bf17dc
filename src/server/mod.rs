//! 웹 서버 - 프로필 처리 폼과 채팅 UI, JSON API
//!
//! | Method | Path | 설명 |
//! |---|---|---|
//! | GET | `/` | 단일 페이지 UI |
//! | GET | `/health` | 상태 확인 |
//! | GET | `/api/models` | 선택 가능한 모델 |
//! | POST | `/api/profiles` | 프로필 처리 → 세션 생성 |
//! | POST | `/api/chat` | 세션에 질문 |
//! | GET | `/api/sessions` | 활성 세션 목록 |
//! | DELETE | `/api/sessions/:session_id` | 세션 종료 |

mod error;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::IcebreakerService;

pub use error::ApiError;

/// 만료 세션 정리 주기
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// 공유 서버 상태
pub struct AppState {
    pub service: IcebreakerService,
}

impl AppState {
    pub fn new(service: IcebreakerService) -> Self {
        Self { service }
    }
}

/// 라우터 생성
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/models", get(handlers::list_models))
        .route("/api/profiles", post(handlers::process_profile))
        .route("/api/chat", post(handlers::chat))
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/sessions/:session_id", delete(handlers::delete_session))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 만료 세션을 주기적으로 정리하는 백그라운드 작업
pub fn spawn_session_reaper(state: Arc<AppState>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // 첫 tick은 즉시 완료
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = state.service.purge_expired();
            if purged > 0 {
                tracing::debug!("Session reaper removed {} sessions", purged);
            }
        }
    })
}

/// 서버 실행 (Ctrl+C로 종료)
pub async fn serve(service: IcebreakerService, host: &str, port: u16) -> Result<()> {
    let bind_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    let state = Arc::new(AppState::new(service));
    let reaper = spawn_session_reaper(state.clone(), PURGE_INTERVAL);
    let app = router(state);

    tracing::info!("Icebreaker server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    reaper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
