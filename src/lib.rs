//! icebreaker-rag - LinkedIn 프로필 기반 아이스브레이커 RAG 봇
//!
//! 스크래핑 API(또는 Mock 프로필)에서 LinkedIn 프로필을 가져와
//! 섹션 단위 노드로 나누고, 임베딩 인덱스를 만든 뒤
//! LLM으로 흥미로운 사실과 질문 답변을 생성합니다.
//!
//! ```text
//! profile → knowledge (chunker + index) → query (retrieve + prompt + LLM)
//!                                             ↑
//!                      session (세션 ID → 인덱스) ← service ← server / cli
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod knowledge;
pub mod llm;
pub mod profile;
pub mod query;
pub mod server;
pub mod service;
pub mod session;

// Re-exports
pub use config::{AppConfig, ConfigError, EmbeddingBackend};
pub use embedding::{
    create_embedder, EmbeddingProvider, GeminiEmbedding, HashEmbedding, OpenAiEmbedding,
};
pub use knowledge::{
    section_chunker, ChunkConfig, Chunker, EmbeddingReport, ProfileIndex, ProfileNode,
    ScoredNode, SectionChunker,
};
pub use llm::{GenerationParams, LlmProvider, OpenAiChat};
pub use profile::{LinkedInProfile, ProfileCache, ProfileError, ProfileFetcher};
pub use query::{Answer, QueryEngine};
pub use service::{ChatTurn, IcebreakerService, ProcessOutcome, ProcessRequest};
pub use session::{Session, SessionStore, SessionSummary};
