//! CLI 모듈
//!
//! icebreaker-rag CLI 명령어 정의 및 구현

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::profile::ProfileCache;
use crate::server;
use crate::service::{IcebreakerService, ProcessRequest};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "icebreaker-rag")]
#[command(version, about = "LinkedIn 프로필 기반 아이스브레이커 RAG 봇", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 웹 UI + JSON API 서버 실행
    Serve {
        /// 바인드 호스트 (기본: ICEBREAKER_HOST)
        #[arg(long)]
        host: Option<String>,

        /// 바인드 포트 (기본: ICEBREAKER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// 프로필을 처리하고 흥미로운 사실 3가지 출력
    Process {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// 프로필을 처리한 뒤 질문 하나에 답변
    Ask {
        /// 질문
        question: String,

        #[command(flatten)]
        profile: ProfileArgs,

        /// 검색할 노드 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// 프로필 캐시 관리
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// 상태 확인
    Status,
}

/// 프로필 지정 옵션
#[derive(clap::Args, Debug, Clone)]
pub struct ProfileArgs {
    /// LinkedIn 프로필 URL
    #[arg(short, long)]
    url: Option<String>,

    /// 스크래핑 API 키 (기본: PROXYCURL_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Mock 프로필 사용
    #[arg(long)]
    mock: bool,

    /// LLM 모델
    #[arg(short, long)]
    model: Option<String>,
}

impl ProfileArgs {
    fn into_request(self) -> Result<ProcessRequest> {
        if !self.mock && self.url.as_deref().map(str::trim).unwrap_or("").is_empty() {
            bail!("--url 또는 --mock 중 하나를 지정해야 합니다");
        }

        Ok(ProcessRequest {
            linkedin_url: self.url.unwrap_or_default(),
            api_key: self.api_key,
            use_mock: self.mock,
            model: self.model,
        })
    }
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// 캐시된 프로필 목록
    List {
        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 캐시된 프로필 삭제
    Delete {
        /// 삭제할 프로필 URL
        #[arg(short, long)]
        url: String,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(config, host, port).await,
        Commands::Process { profile } => cmd_process(config, profile).await,
        Commands::Ask {
            question,
            profile,
            top_k,
        } => cmd_ask(config, &question, profile, top_k).await,
        Commands::Cache { action } => match action {
            CacheAction::List { limit } => cmd_cache_list(&config, limit),
            CacheAction::Delete { url } => cmd_cache_delete(&config, &url),
        },
        Commands::Status => cmd_status(&config),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서버 실행 명령어 (serve)
async fn cmd_serve(config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.host.clone());
    let port = port.unwrap_or(config.port);

    let service = IcebreakerService::from_config(config).context("서비스 초기화 실패")?;

    println!("[*] http://{}:{} 에서 서버를 시작합니다 (Ctrl+C로 종료)", host, port);
    server::serve(service, &host, port).await
}

/// 프로필 처리 명령어 (process)
async fn cmd_process(config: AppConfig, profile: ProfileArgs) -> Result<()> {
    let request = profile.into_request()?;
    let service = IcebreakerService::from_config(config).context("서비스 초기화 실패")?;

    println!("[*] 프로필 처리 중...");
    let outcome = service.process_profile(request).await;

    if !outcome.is_success() {
        bail!("{}", outcome.message);
    }

    println!("[OK] {}", outcome.message);
    Ok(())
}

/// 질문 명령어 (ask)
///
/// 프로필을 처리해 임시 세션을 만들고 질문 하나에 답합니다.
async fn cmd_ask(
    mut config: AppConfig,
    question: &str,
    profile: ProfileArgs,
    top_k: Option<usize>,
) -> Result<()> {
    if question.trim().is_empty() {
        bail!("질문이 비어 있습니다");
    }
    if let Some(k) = top_k {
        config.top_k = k.max(1);
    }

    let request = profile.into_request()?;
    let service = IcebreakerService::from_config(config).context("서비스 초기화 실패")?;

    println!("[*] 프로필 처리 중...");
    let outcome = service.process_profile(request).await;
    let Some(session_id) = outcome.session_id else {
        bail!("{}", outcome.message);
    };

    println!("[*] 질문: \"{}\"", question);
    let answer = service
        .ask(&session_id, question)
        .await
        .context("답변 생성 실패")?;

    println!("\n[OK] 답변:\n");
    println!("{}", answer.response);

    println!("\n[*] 참고한 노드 ({} 건):\n", answer.sources.len());
    for (i, source) in answer.sources.iter().enumerate() {
        let section = source.node.section.as_deref().unwrap_or("-");
        println!(
            "{}. [점수: {:.4}] {} ({})",
            i + 1,
            source.score,
            section,
            source.node.id
        );
        println!("   {}", truncate_text(&source.node.text, 200));
    }

    service.end_session(&session_id);
    Ok(())
}

/// 캐시 목록 명령어 (cache list)
fn cmd_cache_list(config: &AppConfig, limit: usize) -> Result<()> {
    let cache = ProfileCache::open(&config.cache_path()).context("프로필 캐시 열기 실패")?;
    let profiles = cache.list(limit).context("캐시 목록 조회 실패")?;

    if profiles.is_empty() {
        println!("[!] 캐시된 프로필이 없습니다.");
        return Ok(());
    }

    println!("[OK] 캐시된 프로필 ({} 건):\n", profiles.len());

    for profile in profiles {
        let name = profile
            .full_name
            .as_ref()
            .map(|n| truncate_text(n, 40))
            .unwrap_or_else(|| "-".to_string());

        println!("  {}", name);
        println!("        URL: {}", profile.url);
        println!(
            "        {} | {}",
            profile.fetched_at.format("%Y-%m-%d %H:%M"),
            format_bytes(profile.data.to_string().len())
        );
        println!();
    }

    Ok(())
}

/// 캐시 삭제 명령어 (cache delete)
fn cmd_cache_delete(config: &AppConfig, url: &str) -> Result<()> {
    let cache = ProfileCache::open(&config.cache_path()).context("프로필 캐시 열기 실패")?;

    if cache.delete(url).context("캐시 삭제 실패")? {
        println!("[OK] 캐시에서 삭제됨: {}", url);
    } else {
        println!("[!] 캐시에 없는 URL입니다: {}", url);
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &AppConfig) -> Result<()> {
    println!("icebreaker-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] LLM 엔드포인트: {}", config.llm_base_url);
    println!(
        "[*] 기본 모델: {} (선택 가능: {})",
        config.llm_model,
        config.llm_models.join(", ")
    );
    println!("[*] 임베딩: {}", config.embedding_backend.as_str());
    println!(
        "[*] 청크 크기: {}, top-k: {}, 세션 TTL: {}s, 최대 세션: {}",
        config.chunk_size,
        config.top_k,
        config.session_ttl.as_secs(),
        config.max_sessions
    );

    print_key_status("스크래핑 API 키", config.proxycurl_api_key.is_some(), "PROXYCURL_API_KEY");
    print_key_status("LLM API 키", config.llm_api_key.is_some(), "ICEBREAKER_LLM_API_KEY");
    print_key_status("Gemini API 키", config.gemini_api_key.is_some(), "GEMINI_API_KEY");

    if !config.cache_enabled {
        println!("[*] 프로필 캐시: 비활성 (ICEBREAKER_CACHE=1 로 활성화)");
        return Ok(());
    }

    match ProfileCache::open(&config.cache_path()).and_then(|cache| cache.stats()) {
        Ok(stats) => {
            println!("[OK] 프로필 캐시: {} 건", stats.profile_count);
            println!("     총 크기: {}", format_bytes(stats.total_bytes));
            println!("     경로: {}", stats.db_path.display());
        }
        Err(e) => {
            println!("[!] 프로필 캐시 열기 실패: {}", e);
        }
    }

    Ok(())
}

fn print_key_status(label: &str, is_set: bool, env_var: &str) {
    if is_set {
        println!("[OK] {}: 설정됨", label);
    } else {
        println!("[!] {}: 미설정", label);
        println!("    설정: export {}=your-key", env_var);
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
