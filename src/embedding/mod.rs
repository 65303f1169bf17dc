//! 임베딩 모듈 - 텍스트 벡터화 프로바이더
//!
//! 프로필 노드와 질문을 벡터로 변환합니다.
//!
//! - `GeminiEmbedding`: Google Gemini embedContent (Rate limit + 재시도)
//! - `OpenAiEmbedding`: OpenAI 호환 /embeddings (배치)
//! - `HashEmbedding`: 로컬 해싱 임베딩 (API 키 없이 동작)
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(&config)?;
//! let vectors = embedder.embed_documents(&texts).await?;
//! let query = embedder.embed_query("Where did they study?").await?;
//! ```

mod gemini;
mod hashing;
mod openai;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::{AppConfig, EmbeddingBackend};

pub use gemini::GeminiEmbedding;
pub use hashing::HashEmbedding;
pub use openai::OpenAiEmbedding;

/// 로컬 해싱 임베딩 기본 차원
pub const HASH_DIMENSION: usize = 512;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 문서(노드) 배치 임베딩
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// 질문 임베딩 (기본 구현: 문서 임베딩과 동일)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("{} returned no vector for the query", self.name()))
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 임베딩 프로바이더 생성
pub fn create_embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.embedding_backend {
        EmbeddingBackend::Gemini => {
            let api_key = config.gemini_api_key.clone().context(
                "GEMINI_API_KEY or GOOGLE_AI_API_KEY not set.\n\
                 Get your API key at: https://aistudio.google.com/app/apikey",
            )?;
            Arc::new(GeminiEmbedding::new(api_key)?)
        }
        EmbeddingBackend::OpenAi => {
            let api_key = config
                .llm_api_key
                .clone()
                .context("ICEBREAKER_LLM_API_KEY or OPENAI_API_KEY not set")?;
            Arc::new(OpenAiEmbedding::new(
                config.llm_base_url.clone(),
                api_key,
                config.embedding_model.clone(),
            )?)
        }
        EmbeddingBackend::Hash => {
            tracing::warn!("No embedding API configured, using local hashing embeddings");
            Arc::new(HashEmbedding::new(HASH_DIMENSION))
        }
    };

    tracing::info!(
        "Using {} embeddings (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );

    Ok(embedder)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_hash_embedder_by_default() {
        let config = AppConfig::default();
        let embedder = create_embedder(&config).expect("embedder");
        assert_eq!(embedder.name(), "local-hash");
        assert_eq!(embedder.dimension(), HASH_DIMENSION);
    }

    #[test]
    fn test_create_gemini_without_key_returns_error() {
        let config = AppConfig {
            embedding_backend: EmbeddingBackend::Gemini,
            gemini_api_key: None,
            ..AppConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn test_create_openai_embedder() {
        let config = AppConfig {
            embedding_backend: EmbeddingBackend::OpenAi,
            llm_api_key: Some("sk-test".to_string()),
            ..AppConfig::default()
        };
        let embedder = create_embedder(&config).expect("embedder");
        assert_eq!(embedder.name(), "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_default_embed_query_uses_documents() {
        let embedder = HashEmbedding::new(32);
        let query = embedder.embed_query("hello world").await.expect("query");
        let docs = embedder
            .embed_documents(&["hello world".to_string()])
            .await
            .expect("docs");
        assert_eq!(query, docs[0]);
    }
}
