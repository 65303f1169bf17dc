//! LLM 모듈 - OpenAI 호환 채팅 완성 클라이언트
//!
//! 모델은 호출마다 넘기는 파라미터입니다. 세션마다 다른 모델을 골라도
//! 공유 상태를 바꾸지 않습니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

// ============================================================================
// Types
// ============================================================================

/// 생성 파라미터
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

// ============================================================================
// LlmProvider Trait
// ============================================================================

/// LLM 프로바이더 트레이트
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// 프롬프트 하나에 대한 완성 텍스트
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAiChat
// ============================================================================

/// OpenAI 호환 /chat/completions 클라이언트
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiChat {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if config.llm_api_key.is_none() {
            tracing::warn!(
                "No LLM API key set; requests to {} will be sent without authorization",
                config.llm_base_url
            );
        }
        Self::new(config.llm_base_url.clone(), config.llm_api_key.clone())
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 응답에서 첫 번째 선택지의 텍스트 추출
fn first_choice(response: ChatResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .context("LLM response contained no choices")?;

    Ok(choice.message.content.unwrap_or_default().trim().to_string())
}

#[async_trait]
impl LlmProvider for OpenAiChat {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &params.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!("LLM request: model={}, prompt={} bytes", params.model, prompt.len());

        let response = request.send().await.context("Failed to send LLM request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error ({}): {}", status, text);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        first_choice(parsed)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

// ============================================================================
// Tests
// ============================================================================
