//! Profile Cache - rusqlite 기반 프로필 원본 캐시
//!
//! 스크래핑 API 응답(원본 JSON)을 프로필 URL 기준으로 저장합니다.
//! 같은 프로필을 다시 처리할 때 유료 API 호출을 피하기 위한 용도입니다.
//! 저장 위치: ~/.icebreaker-rag/profiles.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::default_data_dir;

// ============================================================================
// Types
// ============================================================================

/// 캐시된 프로필
#[derive(Debug, Clone, Serialize)]
pub struct CachedProfile {
    pub url: String,
    pub full_name: Option<String>,
    pub data: Value,
    pub fetched_at: DateTime<Utc>,
}

/// 캐시 통계
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub profile_count: usize,
    pub total_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// ProfileCache
// ============================================================================

/// 프로필 캐시
pub struct ProfileCache {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl ProfileCache {
    /// 캐시 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS profiles (
                url TEXT PRIMARY KEY,
                full_name TEXT,
                data TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create profiles table")?;

        tracing::debug!("Profile cache initialized at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        })
    }

    /// 기본 위치에서 열기 (~/.icebreaker-rag/profiles.db)
    pub fn open_default() -> Result<Self> {
        Self::open(&default_data_dir().join("profiles.db"))
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 프로필 저장 (같은 URL이면 덮어쓰기)
    pub fn put(&self, url: &str, data: &Value) -> Result<()> {
        let key = normalize_profile_url(url);
        let full_name = data
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let body = serde_json::to_string(data).context("Failed to serialize profile")?;

        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        conn.execute(
            "INSERT OR REPLACE INTO profiles (url, full_name, data, fetched_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, full_name, body, Utc::now().to_rfc3339()],
        )
        .context("Failed to insert profile")?;

        tracing::debug!("Cached profile: {}", key);
        Ok(())
    }

    /// URL로 프로필 조회
    pub fn get(&self, url: &str) -> Result<Option<CachedProfile>> {
        let key = normalize_profile_url(url);
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let row = conn
            .query_row(
                "SELECT url, full_name, data, fetched_at FROM profiles WHERE url = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query profile")?;

        row.map(into_cached).transpose()
    }

    /// 최근 캐시된 프로필 목록
    pub fn list(&self, limit: usize) -> Result<Vec<CachedProfile>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT url, full_name, data, fetched_at FROM profiles
             ORDER BY fetched_at DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut profiles = Vec::new();
        for row in rows {
            match row.map_err(anyhow::Error::from).and_then(into_cached) {
                Ok(profile) => profiles.push(profile),
                Err(e) => tracing::warn!("Skipping unreadable cache row: {}", e),
            }
        }

        Ok(profiles)
    }

    /// 프로필 삭제
    pub fn delete(&self, url: &str) -> Result<bool> {
        let key = normalize_profile_url(url);
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let rows = conn.execute("DELETE FROM profiles WHERE url = ?1", params![key])?;
        Ok(rows > 0)
    }

    /// 캐시 통계
    pub fn stats(&self) -> Result<CacheStats> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let (count, total): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(data)), 0) FROM profiles",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap_or((0, 0));

        Ok(CacheStats {
            profile_count: count as usize,
            total_bytes: total as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 캐시 키용 URL 정규화
///
/// 쿼리와 프래그먼트를 제거하고, 호스트를 소문자로, 끝의 `/`를 제거합니다.
pub fn normalize_profile_url(url: &str) -> String {
    let trimmed = url.trim();

    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}

fn into_cached(row: (String, Option<String>, String, String)) -> Result<CachedProfile> {
    let (url, full_name, data, fetched_at) = row;
    let data = serde_json::from_str(&data).context("Cached profile is not valid JSON")?;

    Ok(CachedProfile {
        url,
        full_name,
        data,
        fetched_at: parse_datetime(&fetched_at),
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_cache() -> (TempDir, ProfileCache) {
        let dir = TempDir::new().unwrap();
        let cache = ProfileCache::open(&dir.path().join("test.db")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_put_and_get() {
        let (_dir, cache) = create_test_cache();

        cache
            .put(
                "https://www.linkedin.com/in/ada/",
                &json!({"full_name": "Ada Example", "skills": ["Rust"]}),
            )
            .unwrap();

        let cached = cache.get("https://www.linkedin.com/in/ada").unwrap();
        let cached = cached.expect("cached profile");
        assert_eq!(cached.full_name.as_deref(), Some("Ada Example"));
        assert_eq!(cached.data["skills"][0], "Rust");

        assert!(cache.get("https://www.linkedin.com/in/nobody").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let (_dir, cache) = create_test_cache();

        cache.put("https://www.linkedin.com/in/ada", &json!({"full_name": "Old"})).unwrap();
        cache.put("https://www.linkedin.com/in/ada/", &json!({"full_name": "New"})).unwrap();

        let list = cache.list(10).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].full_name.as_deref(), Some("New"));
    }

    #[test]
    fn test_delete_and_stats() {
        let (_dir, cache) = create_test_cache();

        cache.put("https://www.linkedin.com/in/a", &json!({"x": 1})).unwrap();
        cache.put("https://www.linkedin.com/in/b", &json!({"y": 2})).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.profile_count, 2);
        assert!(stats.total_bytes > 0);

        assert!(cache.delete("https://www.linkedin.com/in/a/").unwrap());
        assert!(!cache.delete("https://www.linkedin.com/in/a").unwrap());
        assert_eq!(cache.stats().unwrap().profile_count, 1);
    }

    #[test]
    fn test_normalize_profile_url() {
        assert_eq!(
            normalize_profile_url(" https://WWW.LinkedIn.com/in/ada/?trk=feed#top "),
            "https://www.linkedin.com/in/ada"
        );
        assert_eq!(normalize_profile_url("not a url/"), "not a url");
    }
}
