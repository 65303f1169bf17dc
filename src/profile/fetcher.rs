//! 프로필 수집기 - 스크래핑 API 호출 및 Mock 프로필 로드
//!
//! Mock 모드에서는 번들된 프로필(또는 설정된 원격 JSON)을 사용하고,
//! 그 외에는 스크래핑 API를 Bearer 인증으로 호출합니다.

use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::AppConfig;

use super::cache::ProfileCache;
use super::{clean_profile_value, LinkedInProfile};

/// 스크래핑 API 타임아웃
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// 스크래핑 API 고정 쿼리 파라미터
const PROXYCURL_PARAMS: [(&str, &str); 6] = [
    ("fallback_to_cache", "on-error"),
    ("use_cache", "if-present"),
    ("skills", "include"),
    ("inferred_salary", "include"),
    ("personal_email", "include"),
    ("personal_contact_number", "include"),
];

// ============================================================================
// Errors
// ============================================================================

/// 프로필 수집 오류
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("a scraping API key is required when mock data is disabled")]
    MissingApiKey,

    #[error("not a LinkedIn profile URL: {0}")]
    InvalidUrl(String),

    #[error("profile request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("profile API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("profile data could not be parsed: {0}")]
    Parse(String),

    #[error("profile API returned no usable data")]
    Empty,
}

// ============================================================================
// ProfileFetcher
// ============================================================================

/// 프로필 수집기
pub struct ProfileFetcher {
    client: reqwest::Client,
    endpoint: String,
    mock_url: Option<String>,
    cache: Option<ProfileCache>,
}

impl ProfileFetcher {
    /// 새 수집기 생성
    pub fn new(endpoint: impl Into<String>, mock_url: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("icebreaker-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            mock_url,
            cache: None,
        })
    }

    /// 설정에서 생성 (캐시가 켜져 있으면 캐시도 연결)
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let fetcher = Self::new(config.proxycurl_url.clone(), config.mock_profile_url.clone())?;

        if config.cache_enabled {
            let cache = ProfileCache::open(&config.cache_path())?;
            tracing::info!("Profile cache enabled at {:?}", cache.db_path());
            return Ok(fetcher.with_cache(cache));
        }

        Ok(fetcher)
    }

    /// 캐시 연결
    pub fn with_cache(mut self, cache: ProfileCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 프로필 수집
    ///
    /// # Arguments
    /// * `profile_url` - LinkedIn 프로필 URL (Mock 모드에서는 무시)
    /// * `api_key` - 스크래핑 API 키 (Mock 모드에서는 무시)
    /// * `mock` - Mock 프로필 사용 여부
    pub async fn fetch(
        &self,
        profile_url: &str,
        api_key: Option<&str>,
        mock: bool,
    ) -> Result<LinkedInProfile, ProfileError> {
        let started = Instant::now();

        let profile = if mock {
            self.fetch_mock().await?
        } else {
            self.fetch_live(profile_url, api_key).await?
        };

        tracing::info!(
            "Profile extracted: {} ({:.2}s, mock={})",
            profile.display_name(),
            started.elapsed().as_secs_f32(),
            mock
        );

        Ok(profile)
    }

    async fn fetch_mock(&self) -> Result<LinkedInProfile, ProfileError> {
        let Some(ref mock_url) = self.mock_url else {
            tracing::info!("Using bundled mock profile");
            return LinkedInProfile::mock().map_err(|e| ProfileError::Parse(e.to_string()));
        };

        tracing::info!("Loading mock profile from {}", mock_url);
        let response = self.client.get(mock_url).send().await?;
        let value = read_json(response).await?;
        into_profile(value)
    }

    async fn fetch_live(
        &self,
        profile_url: &str,
        api_key: Option<&str>,
    ) -> Result<LinkedInProfile, ProfileError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ProfileError::MissingApiKey)?;

        let profile_url = validate_linkedin_url(profile_url)?;

        if let Some(cache) = &self.cache {
            match cache.get(profile_url.as_str()) {
                Ok(Some(cached)) => {
                    tracing::info!("Profile cache hit: {}", cached.url);
                    return into_profile(cached.data);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Profile cache lookup failed: {}", e),
            }
        }

        tracing::info!("Requesting profile: {}", profile_url);

        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(api_key)
            .query(&[("url", profile_url.as_str())])
            .query(&PROXYCURL_PARAMS[..])
            .send()
            .await?;

        let value = read_json(response).await?;
        let profile = into_profile(value.clone())?;

        // 사용할 수 있는 응답만 캐시
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(profile_url.as_str(), &value) {
                tracing::warn!("Failed to cache profile: {}", e);
            }
        }

        Ok(profile)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// LinkedIn 프로필 URL 검증
///
/// 스킴이 없으면 https를 붙입니다. 호스트는 linkedin.com 또는 그 하위 도메인이어야 합니다.
pub fn validate_linkedin_url(raw: &str) -> Result<Url, ProfileError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProfileError::InvalidUrl(raw.to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|_| ProfileError::InvalidUrl(raw.to_string()))?;

    let host_ok = url
        .host_str()
        .map(|h| {
            let h = h.to_ascii_lowercase();
            h == "linkedin.com" || h.ends_with(".linkedin.com")
        })
        .unwrap_or(false);

    if !host_ok || !matches!(url.scheme(), "http" | "https") {
        return Err(ProfileError::InvalidUrl(raw.to_string()));
    }

    Ok(url)
}

async fn read_json(response: reqwest::Response) -> Result<Value, ProfileError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!("Profile API error {}: {}", status, body);
        return Err(ProfileError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ProfileError::Parse(e.to_string()))
}

fn into_profile(value: Value) -> Result<LinkedInProfile, ProfileError> {
    let cleaned = clean_profile_value(value);
    if cleaned.as_object().map(|m| m.is_empty()).unwrap_or(true) {
        return Err(ProfileError::Empty);
    }

    LinkedInProfile::from_value(cleaned).map_err(|e| ProfileError::Parse(format!("{:#}", e)))
}

// ============================================================================
// Tests
// ============================================================================
