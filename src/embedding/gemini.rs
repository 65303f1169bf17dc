//! Google Gemini 임베딩
//!
//! source: https://ai.google.dev/gemini-api/docs/embeddings
//!
//! 무료 티어 한도(60 RPM)를 지키기 위해 인스턴스마다 Rate limiter를 두고,
//! 429 또는 전송 오류 시 지수 백오프로 재시도합니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::EmbeddingProvider;

/// Gemini 임베딩 API 엔드포인트 (gemini-embedding-001)
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

const GEMINI_MODEL: &str = "models/gemini-embedding-001";

/// 기본 임베딩 차원
const DEFAULT_DIMENSION: usize = 768;

/// 허용 차원 (MRL)
const VALID_DIMENSIONS: [usize; 3] = [768, 1536, 3072];

const RATE_LIMIT_RPM: usize = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const MIN_DELAY: Duration = Duration::from_millis(1000);
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;

/// Gemini 작업 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

// ============================================================================
// Rate Limiter
// ============================================================================

/// 슬라이딩 윈도우 + 최소 간격 Rate limiter
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: usize,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration, min_delay: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay,
            last_request: None,
        }
    }

    /// 다음 요청까지 기다려야 하는 시간
    fn wait_time(&mut self, now: Instant) -> Duration {
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        let gap = self
            .last_request
            .map(|last| self.min_delay.saturating_sub(now.duration_since(last)))
            .unwrap_or_default();

        let window_wait = if self.requests.len() >= self.max_requests {
            self.requests
                .first()
                .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or_default()
        } else {
            Duration::ZERO
        };

        gap.max(window_wait)
    }

    fn record(&mut self, at: Instant) {
        self.requests.push(at);
        self.last_request = Some(at);
    }

    /// 요청 가능할 때까지 대기 후 기록
    async fn acquire(&mut self) {
        let wait = self.wait_time(Instant::now());
        if !wait.is_zero() {
            tracing::debug!("Gemini rate limit: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        self.record(Instant::now());
    }
}

// ============================================================================
// GeminiEmbedding
// ============================================================================

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl GeminiEmbedding {
    /// 기본 차원으로 생성
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 차원을 지정하여 생성 (768, 1536, 3072)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        if !VALID_DIMENSIONS.contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            dimension,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
                MIN_DELAY,
            ))),
        })
    }

    async fn embed_one(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbedRequest {
            model: GEMINI_MODEL,
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
            task_type,
            output_dimensionality: self.dimension,
        };

        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            self.rate_limiter.lock().await.acquire().await;

            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));

            // API 키는 URL이 아닌 헤더로 전송
            let response = match self
                .client
                .post(GEMINI_EMBED_URL)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Gemini request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                return Ok(parsed.embedding.values);
            }

            if status.as_u16() == 429 {
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));
                if attempt < MAX_RETRIES {
                    tracing::warn!(
                        "Gemini rate limit hit (429), backing off {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }

            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                anyhow::bail!(
                    "Gemini API error ({}): {}",
                    error.error.status,
                    error.error.message
                );
            }
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
    #[serde(rename = "taskType")]
    task_type: TaskType,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Gemini embedContent는 단건 API이므로 순차 처리
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding node {}/{}", i + 1, texts.len());
            results.push(self.embed_one(text, TaskType::RetrievalDocument).await?);
        }

        Ok(results)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text, TaskType::RetrievalQuery).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_dimension() {
        let err = GeminiEmbedding::with_dimension("fake_key".to_string(), 999).unwrap_err();
        assert!(err.to_string().contains("Invalid dimension"));
    }

    #[test]
    fn test_valid_dimensions() {
        for dim in VALID_DIMENSIONS {
            assert!(GeminiEmbedding::with_dimension("fake_key".to_string(), dim).is_ok());
        }
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbedRequest {
            model: GEMINI_MODEL,
            content: EmbedContent {
                parts: vec![EmbedPart { text: "hello" }],
            },
            task_type: TaskType::RetrievalQuery,
            output_dimensionality: 768,
        };

        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["outputDimensionality"], 768);
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_rate_limiter_min_gap() {
        let mut limiter = RateLimiter::new(60, Duration::from_secs(60), Duration::from_millis(1000));
        let start = Instant::now();

        assert_eq!(limiter.wait_time(start), Duration::ZERO);
        limiter.record(start);

        let wait = limiter.wait_time(start + Duration::from_millis(400));
        assert_eq!(wait, Duration::from_millis(600));
    }

    #[test]
    fn test_rate_limiter_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(10), Duration::ZERO);
        let start = Instant::now();

        limiter.record(start);
        limiter.record(start + Duration::from_secs(1));

        let wait = limiter.wait_time(start + Duration::from_secs(2));
        assert_eq!(wait, Duration::from_secs(8));

        // 윈도우를 벗어나면 대기 없음
        let wait = limiter.wait_time(start + Duration::from_secs(12));
        assert_eq!(wait, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_blank_text_is_zero_vector() {
        let embedder = GeminiEmbedding::new("fake_key".to_string()).expect("embedder");
        let vector = embedder
            .embed_one("   ", TaskType::RetrievalDocument)
            .await
            .expect("blank");
        assert_eq!(vector.len(), DEFAULT_DIMENSION);
        assert!(vector.iter().all(|v| *v == 0.0));
    }
}
