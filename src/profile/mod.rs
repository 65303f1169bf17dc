//! 프로필 모듈 - LinkedIn 프로필 데이터 모델
//!
//! 스크래핑 API 응답을 정리(clean)하고 타입이 있는 구조체로 변환한 뒤,
//! 청킹에 적합한 Markdown 문서로 렌더링합니다.
//!
//! - `fetcher`: 스크래핑 API / Mock 프로필 로드
//! - `cache`: SQLite 기반 원본 JSON 캐시

mod cache;
mod fetcher;

use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use cache::{normalize_profile_url, CacheStats, CachedProfile, ProfileCache};
pub use fetcher::{ProfileError, ProfileFetcher};

/// 번들된 Mock 프로필 (오프라인 데모용)
const MOCK_PROFILE_JSON: &str = include_str!("../../data/mock_profile.json");

/// 정리 단계에서 제거하는 최상위 키
const DROPPED_KEYS: [&str; 2] = ["people_also_viewed", "certifications"];

/// Markdown 렌더링에서 생략하는 부가 필드
const HIDDEN_EXTRA_KEYS: [&str; 5] = [
    "profile_pic_url",
    "background_cover_image_url",
    "first_name",
    "last_name",
    "country",
];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// ============================================================================
// Types
// ============================================================================

/// 날짜 (스크래핑 API의 day/month/year 객체)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateParts {
    #[serde(default)]
    pub day: Option<u32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl DateParts {
    /// "Mar 2021" 또는 "2021" 형식
    pub fn display(&self) -> Option<String> {
        let year = self.year?;
        match self.month.filter(|m| (1..=12).contains(m)) {
            Some(month) => Some(format!("{} {}", MONTHS[(month - 1) as usize], year)),
            None => Some(year.to_string()),
        }
    }
}

/// 경력 항목
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateParts>,
    #[serde(default)]
    pub ends_at: Option<DateParts>,
}

/// 학력 항목
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Education {
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub degree_name: Option<String>,
    #[serde(default)]
    pub field_of_study: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateParts>,
    #[serde(default)]
    pub ends_at: Option<DateParts>,
}

/// 봉사 활동 항목
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolunteerWork {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateParts>,
    #[serde(default)]
    pub ends_at: Option<DateParts>,
}

/// 성과 항목 (강의, 수상, 프로젝트, 출판물 공통)
///
/// 항목 종류에 따라 이름이 `title` 또는 `name`에 들어옵니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Accomplishment {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Accomplishment {
    fn label(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }

    fn source(&self) -> Option<&str> {
        self.issuer.as_deref().or(self.publisher.as_deref())
    }
}

/// 그룹 항목
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// LinkedIn 프로필
///
/// 알려진 필드는 타입이 있고, 나머지 필드는 `extra`에 보존됩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkedInProfile {
    #[serde(default)]
    pub public_identifier: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country_full_name: Option<String>,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub volunteer_work: Vec<VolunteerWork>,
    #[serde(default)]
    pub accomplishment_courses: Vec<Accomplishment>,
    #[serde(default)]
    pub accomplishment_honors_awards: Vec<Accomplishment>,
    #[serde(default)]
    pub accomplishment_projects: Vec<Accomplishment>,
    #[serde(default)]
    pub accomplishment_publications: Vec<Accomplishment>,
    #[serde(default)]
    pub groups: Vec<Group>,
    /// 나머지 필드 (정리 후 남은 것만)
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Cleaning
// ============================================================================

/// 스크래핑 API 응답 정리
///
/// - 값이 `null`, `""`, `[]`인 최상위 필드 제거
/// - `people_also_viewed`, `certifications` 제거
/// - 그룹 항목의 `profile_pic_url` 제거
///
/// 객체가 아닌 값은 그대로 반환합니다.
pub fn clean_profile_value(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };

    let mut cleaned = Map::with_capacity(map.len());

    for (key, value) in map {
        if DROPPED_KEYS.contains(&key.as_str()) || is_empty_value(&value) {
            continue;
        }
        cleaned.insert(key, value);
    }

    if let Some(Value::Array(groups)) = cleaned.get_mut("groups") {
        for group in groups.iter_mut() {
            if let Value::Object(group) = group {
                group.remove("profile_pic_url");
            }
        }
    }

    Value::Object(cleaned)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

// ============================================================================
// LinkedInProfile
// ============================================================================

impl LinkedInProfile {
    /// 원본 JSON을 정리한 뒤 프로필로 변환
    pub fn from_value(value: Value) -> Result<Self> {
        let cleaned = clean_profile_value(value);
        serde_json::from_value(cleaned).context("Failed to parse profile data")
    }

    /// 번들된 Mock 프로필
    pub fn mock() -> Result<Self> {
        let value: Value =
            serde_json::from_str(MOCK_PROFILE_JSON).context("Bundled mock profile is not valid JSON")?;
        Self::from_value(value)
    }

    /// 표시용 이름
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .or_else(|| self.public_identifier.clone())
            .unwrap_or_else(|| "Unknown profile".to_string())
    }

    /// 위치 문자열 (도시, 주, 국가)
    pub fn location(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.state, &self.country_full_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    /// Markdown 문서로 렌더링
    ///
    /// 이름이 `#` 제목이 되고, 내용이 있는 영역마다 `## 섹션`이 생깁니다.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# {}", self.display_name());
        if let Some(headline) = non_blank(&self.headline) {
            let _ = writeln!(out, "{}", headline);
        }
        if let Some(occupation) = non_blank(&self.occupation) {
            let _ = writeln!(out, "Occupation: {}", occupation);
        }
        if let Some(location) = self.location() {
            let _ = writeln!(out, "Location: {}", location);
        }

        if non_blank(&self.summary).is_some() {
            push_section(&mut out, "About");
            push_description(&mut out, &self.summary);
        }

        if !self.experiences.is_empty() {
            push_section(&mut out, "Experience");
            for exp in &self.experiences {
                let mut line = match (non_blank(&exp.title), non_blank(&exp.company)) {
                    (Some(title), Some(company)) => format!("- {} at {}", title, company),
                    (Some(title), None) => format!("- {}", title),
                    (None, Some(company)) => format!("- {}", company),
                    (None, None) => "- Position".to_string(),
                };
                if let Some(range) = date_range(&exp.starts_at, &exp.ends_at) {
                    let _ = write!(line, " ({})", range);
                }
                if let Some(location) = non_blank(&exp.location) {
                    let _ = write!(line, ", {}", location);
                }
                let _ = writeln!(out, "{}", line);
                push_description(&mut out, &exp.description);
            }
        }

        if !self.education.is_empty() {
            push_section(&mut out, "Education");
            for edu in &self.education {
                let degree: Vec<&str> = [&edu.degree_name, &edu.field_of_study]
                    .into_iter()
                    .filter_map(non_blank)
                    .collect();
                let mut line = match (degree.is_empty(), non_blank(&edu.school)) {
                    (false, Some(school)) => format!("- {} at {}", degree.join(", "), school),
                    (false, None) => format!("- {}", degree.join(", ")),
                    (true, Some(school)) => format!("- {}", school),
                    (true, None) => "- Studies".to_string(),
                };
                if let Some(range) = date_range(&edu.starts_at, &edu.ends_at) {
                    let _ = write!(line, " ({})", range);
                }
                let _ = writeln!(out, "{}", line);
                push_description(&mut out, &edu.description);
            }
        }

        if !self.skills.is_empty() {
            push_section(&mut out, "Skills");
            let _ = writeln!(out, "{}", self.skills.join(", "));
        }

        if !self.languages.is_empty() {
            push_section(&mut out, "Languages");
            let _ = writeln!(out, "{}", self.languages.join(", "));
        }

        if !self.volunteer_work.is_empty() {
            push_section(&mut out, "Volunteering");
            for work in &self.volunteer_work {
                let mut line = match (non_blank(&work.title), non_blank(&work.company)) {
                    (Some(title), Some(org)) => format!("- {} at {}", title, org),
                    (Some(title), None) => format!("- {}", title),
                    (None, Some(org)) => format!("- {}", org),
                    (None, None) => "- Volunteer".to_string(),
                };
                if let Some(cause) = non_blank(&work.cause) {
                    let _ = write!(line, " [{}]", cause.to_lowercase().replace('_', " "));
                }
                if let Some(range) = date_range(&work.starts_at, &work.ends_at) {
                    let _ = write!(line, " ({})", range);
                }
                let _ = writeln!(out, "{}", line);
                push_description(&mut out, &work.description);
            }
        }

        let accomplishments = [
            ("Course", &self.accomplishment_courses),
            ("Honor", &self.accomplishment_honors_awards),
            ("Project", &self.accomplishment_projects),
            ("Publication", &self.accomplishment_publications),
        ];
        if accomplishments.iter().any(|(_, items)| !items.is_empty()) {
            push_section(&mut out, "Accomplishments");
            for (kind, items) in accomplishments {
                for item in items {
                    let mut line = format!("- {}: {}", kind, item.label().unwrap_or("untitled"));
                    if let Some(source) = item.source() {
                        let _ = write!(line, " ({})", source);
                    }
                    let _ = writeln!(out, "{}", line);
                    push_description(&mut out, &item.description);
                }
            }
        }

        let groups: Vec<&str> = self
            .groups
            .iter()
            .filter_map(|g| non_blank(&g.name))
            .collect();
        if !groups.is_empty() {
            push_section(&mut out, "Groups");
            for name in groups {
                let _ = writeln!(out, "- {}", name);
            }
        }

        let extras: Vec<(&String, &Value)> = self
            .extra
            .iter()
            .filter(|(key, value)| !HIDDEN_EXTRA_KEYS.contains(&key.as_str()) && !is_empty_value(value))
            .collect();
        if !extras.is_empty() {
            push_section(&mut out, "Other");
            for (key, value) in extras {
                let _ = writeln!(out, "- {}: {}", key.replace('_', " "), render_value(value));
            }
        }

        out.trim_end().to_string()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn push_section(out: &mut String, title: &str) {
    let _ = write!(out, "\n## {}\n", title);
}

fn push_description(out: &mut String, description: &Option<String>) {
    if let Some(text) = non_blank(description) {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let _ = writeln!(out, "  {}", line);
        }
    }
}

fn date_range(start: &Option<DateParts>, end: &Option<DateParts>) -> Option<String> {
    let start = start.as_ref().and_then(DateParts::display)?;
    let end = end
        .as_ref()
        .and_then(DateParts::display)
        .unwrap_or_else(|| "present".to_string());
    Some(format!("{} - {}", start, end))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.replace('\n', " "),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::knowledge::{section_chunker, Chunker};

    #[test]
    fn test_clean_drops_empty_and_blocked_keys() {
        let raw = json!({
            "full_name": "Ada Example",
            "headline": "",
            "summary": null,
            "skills": [],
            "people_also_viewed": [{"name": "x"}],
            "certifications": [{"name": "y"}],
            "connections": 0,
            "groups": [{"name": "Rustaceans", "profile_pic_url": "https://img"}]
        });

        let cleaned = clean_profile_value(raw);
        let map = cleaned.as_object().expect("object");

        assert_eq!(map.len(), 3);
        assert!(map.contains_key("full_name"));
        assert!(map.contains_key("connections"));
        assert!(!map.contains_key("people_also_viewed"));
        assert_eq!(
            map["groups"][0],
            json!({"name": "Rustaceans"})
        );
    }

    #[test]
    fn test_clean_non_object_passthrough() {
        assert_eq!(clean_profile_value(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_mock_profile_loads() {
        let profile = LinkedInProfile::mock().expect("mock profile");
        assert_eq!(profile.display_name(), "Jordan Rivera");
        assert_eq!(profile.experiences.len(), 3);
        assert_eq!(profile.location().as_deref(), Some("Toronto, Ontario, Canada"));
        assert!(!profile.extra.contains_key("certifications"));
        assert!(!profile.extra.contains_key("people_also_viewed"));
        assert!(!profile.extra.contains_key("personal_emails"));
        assert!(profile.extra.contains_key("recommendations"));
    }

    #[test]
    fn test_markdown_sections() {
        let profile = LinkedInProfile::mock().expect("mock profile");
        let md = profile.to_markdown();

        assert!(md.starts_with("# Jordan Rivera\n"));
        assert!(md.contains("## About"));
        assert!(md.contains("- Director of Developer Relations at Northwind Cloud (Mar 2021 - present)"));
        assert!(md.contains("- Bachelor of Science, Computer Science at McGill University (Sep 2005 - Apr 2009)"));
        assert!(md.contains("## Skills\nData Engineering, Apache Kafka"));
        assert!(md.contains("- Publication: Streaming Pipelines Without Tears (Practical Data Press)"));
        assert!(md.contains("- Toronto Data Engineers"));
        assert!(md.contains("- recommendations: Jordan is the rare engineer"));
        assert!(!md.contains("Certified Kubernetes Administrator"));
        assert!(!md.contains("profile pic url"));
    }

    #[test]
    fn test_markdown_omits_missing_sections() {
        let profile = LinkedInProfile::from_value(json!({
            "full_name": "Sam Minimal",
            "headline": "Engineer"
        }))
        .expect("profile");

        let md = profile.to_markdown();
        assert_eq!(md, "# Sam Minimal\nEngineer");
    }

    #[test]
    fn test_date_display() {
        let date = DateParts { day: None, month: Some(13), year: Some(2020) };
        assert_eq!(date.display().as_deref(), Some("2020"));

        let date = DateParts { day: Some(1), month: Some(1), year: None };
        assert_eq!(date.display(), None);
    }

    #[test]
    fn test_unnamed_profile_display_name() {
        let profile = LinkedInProfile::from_value(json!({"skills": [], "full_name": ""}))
            .expect("profile");
        assert_eq!(profile.display_name(), "Unknown profile");
    }

    #[test]
    fn test_summary_headings_stay_in_about_section() {
        let profile = LinkedInProfile::from_value(json!({
            "full_name": "Ada Example",
            "summary": "Builder of things.\n## Side projects\nCompilers",
            "skills": ["Rust"]
        }))
        .expect("profile");

        let md = profile.to_markdown();
        assert!(md.contains("## About\n  Builder of things.\n  ## Side projects\n  Compilers"));

        let nodes = section_chunker(1200).chunk(&md);
        let sections: Vec<Option<&str>> = nodes.iter().map(|n| n.section.as_deref()).collect();
        assert!(!sections.contains(&Some("Side projects")));
        assert!(sections.contains(&Some("About")));
        assert!(sections.contains(&Some("Skills")));
    }
}
