//! 설정 모듈 - 환경변수 기반 애플리케이션 설정
//!
//! 모든 설정은 환경변수에서 읽습니다. 테스트에서는 `from_lookup`으로
//! 프로세스 환경과 무관하게 설정을 구성할 수 있습니다.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Defaults
// ============================================================================

/// 프로필 스크래핑 API 엔드포인트
pub const DEFAULT_PROXYCURL_URL: &str = "https://nubela.co/proxycurl/api/v2/linkedin";

/// OpenAI 호환 LLM 엔드포인트
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

/// 기본 LLM 모델
pub const DEFAULT_LLM_MODEL: &str = "ibm/granite-3-2-8b-instruct";

/// 선택 가능한 기본 모델 목록
pub const DEFAULT_LLM_MODELS: [&str; 2] = [
    "ibm/granite-3-2-8b-instruct",
    "meta-llama/llama-3-3-70b-instruct",
];

/// OpenAI 호환 임베딩 모델
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Mock 모드에서 URL이 비어 있을 때 사용하는 프로필 URL
pub const DEFAULT_MOCK_PROFILE_URL: &str = "https://www.linkedin.com/in/jordan-rivera-demo/";

// ============================================================================
// Errors
// ============================================================================

/// 설정 오류
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

// ============================================================================
// Types
// ============================================================================

/// 임베딩 백엔드 선택
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Google Gemini embedContent
    Gemini,
    /// OpenAI 호환 /embeddings
    OpenAi,
    /// 로컬 해싱 임베딩 (오프라인)
    Hash,
}

impl EmbeddingBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingBackend::Gemini => "gemini",
            EmbeddingBackend::OpenAi => "openai",
            EmbeddingBackend::Hash => "hash",
        }
    }
}

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub proxycurl_api_key: Option<String>,
    pub proxycurl_url: String,
    pub mock_profile_url: Option<String>,

    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,

    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    pub gemini_api_key: Option<String>,

    pub chunk_size: usize,
    pub top_k: usize,

    pub session_ttl: Duration,
    pub max_sessions: usize,

    pub cache_enabled: bool,
    pub data_dir: PathBuf,

    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            proxycurl_api_key: None,
            proxycurl_url: DEFAULT_PROXYCURL_URL.to_string(),
            mock_profile_url: None,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_api_key: None,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_models: DEFAULT_LLM_MODELS.iter().map(|m| m.to_string()).collect(),
            temperature: 0.0,
            max_tokens: 500,
            embedding_backend: EmbeddingBackend::Hash,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            gemini_api_key: None,
            chunk_size: 1200,
            top_k: 5,
            session_ttl: Duration::from_secs(3600),
            max_sessions: 64,
            cache_enabled: false,
            data_dir: default_data_dir(),
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl AppConfig {
    /// 프로세스 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 설정 로드
    ///
    /// 빈 문자열은 미설정으로 취급합니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let llm_model = get("ICEBREAKER_LLM_MODEL").unwrap_or(defaults.llm_model);
        let mut llm_models: Vec<String> = match get("ICEBREAKER_LLM_MODELS") {
            Some(list) => list
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            None => defaults.llm_models,
        };
        if !llm_models.contains(&llm_model) {
            llm_models.insert(0, llm_model.clone());
        }

        let gemini_api_key = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_AI_API_KEY"));
        let llm_api_key = get("ICEBREAKER_LLM_API_KEY").or_else(|| get("OPENAI_API_KEY"));

        let embedding_backend = match get("ICEBREAKER_EMBEDDING") {
            Some(value) => parse_backend(&value)?,
            None if gemini_api_key.is_some() => EmbeddingBackend::Gemini,
            None if llm_api_key.is_some() => EmbeddingBackend::OpenAi,
            None => EmbeddingBackend::Hash,
        };

        let chunk_size = parse_or("ICEBREAKER_CHUNK_SIZE", get("ICEBREAKER_CHUNK_SIZE"), defaults.chunk_size)?;
        if chunk_size < 100 {
            return Err(ConfigError::Invalid {
                key: "ICEBREAKER_CHUNK_SIZE",
                value: chunk_size.to_string(),
                reason: "must be at least 100".to_string(),
            });
        }

        let ttl_secs: u64 = parse_or(
            "ICEBREAKER_SESSION_TTL_SECS",
            get("ICEBREAKER_SESSION_TTL_SECS"),
            defaults.session_ttl.as_secs(),
        )?;

        let max_sessions = parse_or("ICEBREAKER_MAX_SESSIONS", get("ICEBREAKER_MAX_SESSIONS"), defaults.max_sessions)?;
        if max_sessions == 0 {
            return Err(ConfigError::Invalid {
                key: "ICEBREAKER_MAX_SESSIONS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let cache_enabled = match get("ICEBREAKER_CACHE") {
            Some(value) => parse_flag("ICEBREAKER_CACHE", &value)?,
            None => false,
        };

        Ok(Self {
            proxycurl_api_key: get("PROXYCURL_API_KEY"),
            proxycurl_url: get("ICEBREAKER_PROXYCURL_URL").unwrap_or(defaults.proxycurl_url),
            mock_profile_url: get("ICEBREAKER_MOCK_PROFILE_URL"),
            llm_base_url: get("ICEBREAKER_LLM_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.llm_base_url),
            llm_api_key,
            llm_model,
            llm_models,
            temperature: parse_or("ICEBREAKER_TEMPERATURE", get("ICEBREAKER_TEMPERATURE"), defaults.temperature)?,
            max_tokens: parse_or("ICEBREAKER_MAX_TOKENS", get("ICEBREAKER_MAX_TOKENS"), defaults.max_tokens)?,
            embedding_backend,
            embedding_model: get("ICEBREAKER_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            gemini_api_key,
            chunk_size,
            top_k: parse_or("ICEBREAKER_TOP_K", get("ICEBREAKER_TOP_K"), defaults.top_k)?,
            session_ttl: Duration::from_secs(ttl_secs),
            max_sessions,
            cache_enabled,
            data_dir: get("ICEBREAKER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            host: get("ICEBREAKER_HOST").unwrap_or(defaults.host),
            port: parse_or("ICEBREAKER_PORT", get("ICEBREAKER_PORT"), defaults.port)?,
        })
    }

    /// 프로필 캐시 DB 경로
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("profiles.db")
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 데이터 디렉토리 경로 (~/.icebreaker-rag/)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".icebreaker-rag")
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            value: value.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_backend(value: &str) -> Result<EmbeddingBackend, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "gemini" => Ok(EmbeddingBackend::Gemini),
        "openai" => Ok(EmbeddingBackend::OpenAi),
        "hash" | "local" => Ok(EmbeddingBackend::Hash),
        _ => Err(ConfigError::Invalid {
            key: "ICEBREAKER_EMBEDDING",
            value: value.to_string(),
            reason: "expected gemini, openai or hash".to_string(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        let config = config_from(&[]).expect("default config");
        assert_eq!(config.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.llm_models.len(), 2);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.port, 5000);
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hash);
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_backend_auto_selection() {
        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]).expect("config");
        assert_eq!(config.embedding_backend, EmbeddingBackend::OpenAi);
        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));

        let config = config_from(&[("OPENAI_API_KEY", "sk"), ("GOOGLE_AI_API_KEY", "g")]).expect("config");
        assert_eq!(config.embedding_backend, EmbeddingBackend::Gemini);

        let config = config_from(&[("GEMINI_API_KEY", "g"), ("ICEBREAKER_EMBEDDING", "hash")]).expect("config");
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hash);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[("PROXYCURL_API_KEY", "  "), ("ICEBREAKER_TOP_K", "")]).expect("config");
        assert!(config.proxycurl_api_key.is_none());
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = config_from(&[("ICEBREAKER_PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("ICEBREAKER_PORT"));

        let err = config_from(&[("ICEBREAKER_MAX_SESSIONS", "0")]).unwrap_err();
        assert!(err.to_string().contains("ICEBREAKER_MAX_SESSIONS"));
    }

    #[test]
    fn test_custom_model_joins_model_list() {
        let config = config_from(&[
            ("ICEBREAKER_LLM_MODEL", "gpt-4o-mini"),
            ("ICEBREAKER_LLM_MODELS", "a, b ,,"),
            ("ICEBREAKER_LLM_BASE_URL", "http://localhost:11434/v1/"),
        ])
        .expect("config");
        assert_eq!(config.llm_models, vec!["gpt-4o-mini", "a", "b"]);
        assert_eq!(config.llm_base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn test_cache_flag() {
        assert!(config_from(&[("ICEBREAKER_CACHE", "on")]).expect("config").cache_enabled);
        assert!(config_from(&[("ICEBREAKER_CACHE", "maybe")]).is_err());
    }
}
