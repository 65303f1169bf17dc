//! Icebreaker 서비스 - 프로필 처리와 채팅 워크플로우
//!
//! 웹 서버와 CLI가 같은 경로를 쓰도록 전체 파이프라인을 묶습니다.
//!
//! ```text
//! fetch → Markdown 렌더링 → 청킹 → 인덱스 구축 → 임베딩 검증 → 초기 사실 → 세션 등록
//! ```
//!
//! 실패는 패닉이나 HTTP 오류가 아니라 사용자에게 보여줄 메시지로 돌려줍니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, DEFAULT_MOCK_PROFILE_URL};
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::knowledge::{section_chunker, Chunker, ProfileIndex, ProfileNode};
use crate::llm::{LlmProvider, OpenAiChat};
use crate::profile::ProfileFetcher;
use crate::query::{Answer, QueryEngine};
use crate::session::{Session, SessionStore, SessionSummary};

// ============================================================================
// Messages
// ============================================================================

pub const FETCH_FAILED_MESSAGE: &str =
    "Failed to retrieve profile data. Please check the URL or API key.";
pub const NO_NODES_MESSAGE: &str = "Failed to process profile data into nodes.";
pub const NO_PROFILE_MESSAGE: &str = "No profile loaded. Please process a LinkedIn profile first.";
pub const SESSION_EXPIRED_MESSAGE: &str =
    "Session expired. Please process the LinkedIn profile again.";

const SUCCESS_PREFIX: &str =
    "Profile processed successfully!\n\nHere are 3 interesting facts about this person:\n\n";

// ============================================================================
// Types
// ============================================================================

/// 프로필 처리 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub linkedin_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub use_mock: bool,
    #[serde(default)]
    pub model: Option<String>,
}

/// 프로필 처리 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub message: String,
    pub session_id: Option<String>,
    pub facts: Option<String>,
}

impl ProcessOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            facts: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.session_id.is_some()
    }
}

/// 대화 한 턴
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

impl ChatTurn {
    fn new(user: &str, assistant: impl Into<String>) -> Self {
        Self {
            user: user.to_string(),
            assistant: assistant.into(),
        }
    }
}

/// 모델 목록
#[derive(Debug, Clone, Serialize)]
pub struct ModelList {
    pub default: String,
    pub models: Vec<String>,
}

/// 채팅 전 세션 조회 결과
enum SessionLookup {
    Missing,
    Expired,
    Found(Session),
}

// ============================================================================
// IcebreakerService
// ============================================================================

/// 프로필 처리 + 채팅 서비스
pub struct IcebreakerService {
    config: AppConfig,
    fetcher: ProfileFetcher,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Box<dyn Chunker>,
    engine: QueryEngine,
    sessions: SessionStore,
}

impl IcebreakerService {
    /// 구성 요소를 직접 지정해서 생성
    pub fn new(
        config: AppConfig,
        fetcher: ProfileFetcher,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let engine = QueryEngine::new(embedder.clone(), llm, config.top_k)
            .with_sampling(config.temperature, config.max_tokens);
        let sessions = SessionStore::new(config.session_ttl, config.max_sessions);
        let chunker = section_chunker(config.chunk_size);

        Self {
            config,
            fetcher,
            embedder,
            chunker,
            engine,
            sessions,
        }
    }

    /// 설정에서 모든 구성 요소를 만들어 생성
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let fetcher = ProfileFetcher::from_config(&config)?;
        let embedder = create_embedder(&config)?;
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiChat::from_config(&config)?);

        tracing::info!(
            "Icebreaker service ready (llm={}, model={}, embeddings={}, top_k={})",
            llm.name(),
            config.llm_model,
            embedder.name(),
            config.top_k
        );

        Ok(Self::new(config, fetcher, embedder, llm))
    }

    /// 청커 교체
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &ProfileFetcher {
        &self.fetcher
    }

    pub fn session_store(&self) -> &SessionStore {
        &self.sessions
    }

    /// 요청 모델 결정 (비어 있으면 기본 모델)
    fn resolve_model(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.llm_model.as_str())
            .to_string()
    }

    // ------------------------------------------------------------------------
    // Process
    // ------------------------------------------------------------------------

    /// LinkedIn 프로필 처리
    ///
    /// 성공하면 새 세션 ID와 초기 사실 3가지를 돌려줍니다.
    pub async fn process_profile(&self, request: ProcessRequest) -> ProcessOutcome {
        let model = self.resolve_model(request.model.as_deref());

        let url = match request.linkedin_url.trim() {
            "" if request.use_mock => DEFAULT_MOCK_PROFILE_URL.to_string(),
            url => url.to_string(),
        };

        let api_key = request
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.proxycurl_api_key.clone());

        tracing::info!("Processing profile: {} (mock={}, model={})", url, request.use_mock, model);

        let profile = match self
            .fetcher
            .fetch(&url, api_key.as_deref(), request.use_mock)
            .await
        {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Profile fetch failed: {}", e);
                return ProcessOutcome::failure(FETCH_FAILED_MESSAGE);
            }
        };

        let markdown = profile.to_markdown();
        let nodes = self.chunker.chunk(&markdown);
        if nodes.is_empty() {
            tracing::warn!("Profile produced no nodes: {}", url);
            return ProcessOutcome::failure(NO_NODES_MESSAGE);
        }
        tracing::info!("Profile split into {} nodes ({})", nodes.len(), self.chunker.name());

        match self
            .index_and_summarize(nodes, &model, &profile.display_name(), &url)
            .await
        {
            Ok((session_id, facts)) => ProcessOutcome {
                message: format!("{}{}", SUCCESS_PREFIX, facts),
                session_id: Some(session_id),
                facts: Some(facts),
            },
            Err(e) => {
                tracing::error!("Error processing profile: {:#}", e);
                ProcessOutcome::failure(format!("Error: {:#}", e))
            }
        }
    }

    async fn index_and_summarize(
        &self,
        nodes: Vec<ProfileNode>,
        model: &str,
        profile_name: &str,
        profile_url: &str,
    ) -> Result<(String, String)> {
        let index = ProfileIndex::build(nodes, self.embedder.as_ref())
            .await
            .context("Failed to build profile index")?;

        let report = index.verify_embeddings();
        if !report.is_healthy() {
            tracing::warn!(
                "Some embeddings look invalid ({} missing, {} invalid); continuing",
                report.missing,
                report.invalid
            );
        }

        let facts = self.engine.generate_initial_facts(&index, model).await?;
        let session_id = self
            .sessions
            .insert(Arc::new(index), model, profile_name, profile_url);

        Ok((session_id, facts))
    }

    // ------------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------------

    fn lookup(&self, session_id: Option<&str>) -> SessionLookup {
        match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            None => SessionLookup::Missing,
            Some(id) => match self.sessions.get(id) {
                Some(session) => SessionLookup::Found(session),
                None => SessionLookup::Expired,
            },
        }
    }

    /// 세션의 프로필에 대해 질문 (출처 포함)
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<Answer> {
        let session = match self.lookup(Some(session_id)) {
            SessionLookup::Found(session) => session,
            SessionLookup::Missing => anyhow::bail!(NO_PROFILE_MESSAGE),
            SessionLookup::Expired => anyhow::bail!(SESSION_EXPIRED_MESSAGE),
        };

        self.engine
            .answer_user_query(&session.index, question, &session.model)
            .await
    }

    /// 채팅 한 턴 처리 후 갱신된 대화 기록 반환
    pub async fn chat(
        &self,
        session_id: Option<&str>,
        query: &str,
        mut history: Vec<ChatTurn>,
    ) -> Vec<ChatTurn> {
        let session = match self.lookup(session_id) {
            SessionLookup::Found(session) => session,
            SessionLookup::Missing => {
                history.push(ChatTurn::new(query, NO_PROFILE_MESSAGE));
                return history;
            }
            SessionLookup::Expired => {
                history.push(ChatTurn::new(query, SESSION_EXPIRED_MESSAGE));
                return history;
            }
        };

        if query.trim().is_empty() {
            return history;
        }

        let reply = match self
            .engine
            .answer_user_query(&session.index, query, &session.model)
            .await
        {
            Ok(answer) => answer.response,
            Err(e) => {
                tracing::error!("Error in chat (session {}): {:#}", session.id, e);
                format!("Error: {:#}", e)
            }
        };

        history.push(ChatTurn::new(query, reply));
        history
    }

    // ------------------------------------------------------------------------
    // Sessions / Models
    // ------------------------------------------------------------------------

    /// 세션 종료
    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id)
    }

    /// 활성 세션 목록
    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.sessions.list()
    }

    /// 만료 세션 정리
    pub fn purge_expired(&self) -> usize {
        self.sessions.purge_expired()
    }

    /// 선택 가능한 모델 목록
    pub fn available_models(&self) -> ModelList {
        ModelList {
            default: self.config.llm_model.clone(),
            models: self.config.llm_models.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
