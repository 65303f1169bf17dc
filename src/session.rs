//! 세션 저장소 - 세션 ID별 프로필 인덱스 관리
//!
//! 처리된 프로필마다 UUID 세션을 만들고, 이후 채팅 요청은 세션 ID로
//! 해당 인덱스를 찾습니다. 유휴 시간이 TTL을 넘은 세션은 만료되며,
//! 용량이 차면 가장 오래 사용되지 않은 세션부터 제거합니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::knowledge::ProfileIndex;

// ============================================================================
// Types
// ============================================================================

/// 세션
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub index: Arc<ProfileIndex>,
    /// 이 세션에서 사용하는 LLM 모델
    pub model: String,
    pub profile_name: String,
    pub profile_url: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// 세션 목록 항목
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub profile_name: String,
    pub profile_url: String,
    pub model: String,
    pub nodes: usize,
    pub embedder: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub idle_secs: u64,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    touched: Instant,
    /// LRU 순서 (클수록 최근)
    tick: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_tick: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }
}

// ============================================================================
// SessionStore
// ============================================================================

/// 스레드 안전 세션 저장소
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<Inner>>,
    ttl: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // 잠금 중 패닉이 나도 맵 자체는 일관된 상태
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.touched) >= self.ttl
    }

    /// 새 세션 등록 후 ID 반환
    pub fn insert(
        &self,
        index: Arc<ProfileIndex>,
        model: &str,
        profile_name: &str,
        profile_url: &str,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut inner = self.lock();

        while inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.tick)
                .map(|(id, _)| id.clone());

            match oldest {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    tracing::info!("Session capacity reached, evicted {}", oldest);
                }
                None => break,
            }
        }

        let tick = inner.tick();
        inner.entries.insert(
            id.clone(),
            Entry {
                session: Session {
                    id: id.clone(),
                    index,
                    model: model.to_string(),
                    profile_name: profile_name.to_string(),
                    profile_url: profile_url.to_string(),
                    created_at: now,
                    last_used: now,
                },
                touched: Instant::now(),
                tick,
            },
        );

        tracing::info!("Session {} created for {} ({} active)", id, profile_name, inner.entries.len());
        id
    }

    /// 세션 조회 (사용 시각 갱신)
    ///
    /// 만료된 세션은 제거되고 `None`을 반환합니다.
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = Instant::now();
        let mut inner = self.lock();

        let expired = self.is_expired(inner.entries.get(id)?, now);
        if expired {
            inner.entries.remove(id);
            tracing::info!("Session {} expired", id);
            return None;
        }

        let tick = inner.tick();
        let entry = inner.entries.get_mut(id)?;
        entry.touched = now;
        entry.tick = tick;
        entry.session.last_used = Utc::now();

        Some(entry.session.clone())
    }

    /// 세션 제거
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.lock().entries.remove(id).is_some();
        if removed {
            tracing::info!("Session {} removed", id);
        }
        removed
    }

    /// 활성 세션 목록 (최근 사용 순)
    pub fn list(&self) -> Vec<SessionSummary> {
        let now = Instant::now();
        let inner = self.lock();

        let mut entries: Vec<&Entry> = inner
            .entries
            .values()
            .filter(|e| !self.is_expired(e, now))
            .collect();
        entries.sort_by(|a, b| b.tick.cmp(&a.tick));

        entries
            .into_iter()
            .map(|e| SessionSummary {
                id: e.session.id.clone(),
                profile_name: e.session.profile_name.clone(),
                profile_url: e.session.profile_url.clone(),
                model: e.session.model.clone(),
                nodes: e.session.index.len(),
                embedder: e.session.index.embedder().to_string(),
                created_at: e.session.created_at,
                last_used: e.session.last_used,
                idle_secs: now.duration_since(e.touched).as_secs(),
            })
            .collect()
    }

    /// 만료 세션 일괄 제거
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();

        let before = inner.entries.len();
        let ttl = self.ttl;
        inner
            .entries
            .retain(|_, e| now.duration_since(e.touched) < ttl);
        let purged = before - inner.entries.len();

        if purged > 0 {
            tracing::info!("Purged {} expired sessions", purged);
        }
        purged
    }

    /// 저장된 세션 수 (만료 대기 중 포함)
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::ProfileNode;

    fn index(text: &str) -> Arc<ProfileIndex> {
        Arc::new(ProfileIndex::from_parts(
            vec![ProfileNode {
                id: "node-0".to_string(),
                section: None,
                text: text.to_string(),
            }],
            vec![vec![1.0, 0.0]],
            2,
            "test",
        ))
    }

    #[test]
    fn test_insert_and_get() {
        let store = SessionStore::new(Duration::from_secs(60), 4);
        let id = store.insert(index("a"), "model-a", "Ada", "https://www.linkedin.com/in/ada");

        assert!(Uuid::parse_str(&id).is_ok());
        let session = store.get(&id).expect("session");
        assert_eq!(session.model, "model-a");
        assert_eq!(session.profile_name, "Ada");
        assert_eq!(session.index.len(), 1);
        assert!(session.last_used >= session.created_at);

        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let store = SessionStore::new(Duration::from_secs(60), 8);
        let a = store.insert(index("a"), "m", "A", "u");
        let b = store.insert(index("b"), "m", "B", "u");
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let store = SessionStore::new(Duration::ZERO, 4);
        let id = store.insert(index("a"), "m", "A", "u");

        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let store = SessionStore::new(Duration::ZERO, 4);
        store.insert(index("a"), "m", "A", "u");
        store.insert(index("b"), "m", "B", "u");

        assert!(store.list().is_empty());
        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn test_lru_eviction() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        let first = store.insert(index("a"), "m", "A", "u");
        let second = store.insert(index("b"), "m", "B", "u");

        // first를 사용해서 second가 가장 오래된 세션이 됨
        assert!(store.get(&first).is_some());

        let third = store.insert(index("c"), "m", "C", "u");
        assert_eq!(store.len(), 2);
        assert!(store.get(&first).is_some());
        assert!(store.get(&second).is_none());
        assert!(store.get(&third).is_some());
    }

    #[test]
    fn test_remove_and_list() {
        let store = SessionStore::new(Duration::from_secs(60), 4);
        let a = store.insert(index("a"), "model-a", "A", "u");
        let b = store.insert(index("b"), "model-b", "B", "u");

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, b);
        assert_eq!(list[0].nodes, 1);
        assert_eq!(list[0].embedder, "test");

        assert!(store.remove(&a));
        assert!(!store.remove(&a));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_capacity_minimum_is_one() {
        let store = SessionStore::new(Duration::from_secs(60), 0);
        assert_eq!(store.capacity(), 1);
        store.insert(index("a"), "m", "A", "u");
        store.insert(index("b"), "m", "B", "u");
        assert_eq!(store.len(), 1);
    }
}
