//! Text Chunking Module
//!
//! 프로필 Markdown 문서를 섹션 단위 노드로 분할합니다.
//! 섹션이 너무 길면 줄 경계, 그 다음 단어 경계에서 나누고,
//! 나뉜 조각마다 섹션 제목을 붙여 단독으로도 의미가 통하게 합니다.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최소 노드 크기 (문자 수). 이보다 작은 조각은 앞 조각과 병합
    pub min_characters: usize,
    /// 최대 노드 크기 (문자 수)
    pub max_characters: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::with_max(1200)
    }
}

impl ChunkConfig {
    /// 최대 크기만 지정 (최소 크기는 최대의 1/10)
    pub fn with_max(max_characters: usize) -> Self {
        Self {
            min_characters: max_characters / 10,
            max_characters,
        }
    }
}

// ============================================================================
// Types
// ============================================================================

/// 인덱싱 단위 노드
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileNode {
    /// 노드 ID (`node-<n>`)
    pub id: String,
    /// 소속 섹션 제목
    pub section: Option<String>,
    /// 노드 텍스트
    pub text: String,
}

/// 텍스트 분할 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 노드로 분할
    fn chunk(&self, text: &str) -> Vec<ProfileNode>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

/// Markdown 섹션
#[derive(Debug, Default)]
struct Section {
    /// 제목 줄 그대로 (`## Experience`)
    heading: Option<String>,
    /// 제목 텍스트 (`Experience`)
    title: Option<String>,
    /// 본문 줄
    lines: Vec<String>,
}

impl Section {
    fn text(&self) -> String {
        let mut text = String::new();
        if let Some(heading) = &self.heading {
            text.push_str(heading);
        }
        for line in &self.lines {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(line);
        }
        text.trim().to_string()
    }

    fn is_blank(&self) -> bool {
        self.heading.is_none() && self.lines.iter().all(|l| l.trim().is_empty())
    }
}

// ============================================================================
// SectionChunker
// ============================================================================

/// 섹션 인식 청커
pub struct SectionChunker {
    config: ChunkConfig,
}

impl SectionChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    /// Markdown 제목 기준으로 섹션 분할
    fn split_sections(&self, text: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current = Section::default();

        for line in text.lines() {
            if let Some(caps) = heading_regex().captures(line) {
                if !current.is_blank() {
                    sections.push(std::mem::take(&mut current));
                }
                current.heading = Some(line.trim_end().to_string());
                current.title = Some(caps[2].trim().to_string());
                continue;
            }
            current.lines.push(line.trim_end().to_string());
        }

        if !current.is_blank() {
            sections.push(current);
        }

        sections
    }

    /// 긴 섹션을 줄, 단어 경계에서 분할
    fn split_long_section(&self, section: &Section) -> Vec<String> {
        let max = self.config.max_characters;

        // 제목이 예산의 절반을 넘으면 반복하지 않음
        let prefix = section
            .heading
            .as_deref()
            .filter(|h| char_len(h) + 1 <= max / 2);
        let budget = match prefix {
            Some(h) => max - (char_len(h) + 1),
            None => max,
        }
        .max(1);

        let mut pieces = Vec::new();
        let mut current = String::new();

        let body_lines = section
            .lines
            .iter()
            .map(|l| l.as_str())
            .filter(|l| !l.trim().is_empty());

        // 제목을 반복하지 않는 경우 제목 줄도 본문처럼 취급
        let heading_line = if prefix.is_none() {
            section.heading.as_deref()
        } else {
            None
        };

        for line in heading_line.into_iter().chain(body_lines) {
            for piece in split_line(line, budget) {
                if !current.is_empty() && char_len(&current) + 1 + char_len(&piece) > budget {
                    pieces.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(&piece);
            }
        }

        if !current.trim().is_empty() {
            pieces.push(current);
        }

        let pieces = self.merge_small_pieces(pieces, budget);

        match prefix {
            Some(heading) => pieces
                .into_iter()
                .map(|p| format!("{}\n{}", heading, p))
                .collect(),
            None => pieces,
        }
    }

    /// 작은 조각을 앞 조각에 병합
    fn merge_small_pieces(&self, pieces: Vec<String>, budget: usize) -> Vec<String> {
        if self.config.min_characters == 0 {
            return pieces;
        }

        let mut result: Vec<String> = Vec::with_capacity(pieces.len());

        for piece in pieces {
            if let Some(last) = result.last_mut() {
                if char_len(&piece) < self.config.min_characters
                    && char_len(last) + 1 + char_len(&piece) <= budget
                {
                    last.push('\n');
                    last.push_str(&piece);
                    continue;
                }
            }
            result.push(piece);
        }

        result
    }
}

impl Chunker for SectionChunker {
    fn chunk(&self, text: &str) -> Vec<ProfileNode> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut nodes = Vec::new();

        for section in self.split_sections(text) {
            let full = section.text();
            if full.is_empty() {
                continue;
            }

            let pieces = if char_len(&full) <= self.config.max_characters {
                vec![full]
            } else {
                self.split_long_section(&section)
            };

            for piece in pieces {
                nodes.push(ProfileNode {
                    id: format!("node-{}", nodes.len()),
                    section: section.title.clone(),
                    text: piece,
                });
            }
        }

        tracing::debug!("{} produced {} nodes", self.name(), nodes.len());
        nodes
    }

    fn name(&self) -> &'static str {
        "SectionChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn heading_regex() -> &'static Regex {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"))
}

/// 한 줄을 예산 이하 조각으로 분할 (단어 경계)
///
/// 예산보다 긴 단어 하나는 그대로 한 조각이 됩니다.
fn split_line(line: &str, budget: usize) -> Vec<String> {
    if char_len(line) <= budget {
        return vec![line.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        if !current.is_empty() && char_len(&current) + 1 + char_len(word) > budget {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 최대 크기를 지정한 청커 생성
pub fn section_chunker(max_characters: usize) -> Box<dyn Chunker> {
    Box::new(SectionChunker::new(ChunkConfig::with_max(max_characters)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::LinkedInProfile;

    fn chunker(max: usize, min: usize) -> SectionChunker {
        SectionChunker::new(ChunkConfig {
            min_characters: min,
            max_characters: max,
        })
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = SectionChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\n ").is_empty());
    }

    #[test]
    fn test_one_node_per_small_section() {
        let text = "# Ada\nEngineer\n\n## Skills\nRust, Go\n\n## Languages\nEnglish";
        let nodes = chunker(1200, 0).chunk(text);

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].text, "# Ada\nEngineer");
        assert_eq!(nodes[0].section.as_deref(), Some("Ada"));
        assert_eq!(nodes[1].text, "## Skills\nRust, Go");
        assert_eq!(nodes[2].section.as_deref(), Some("Languages"));
        assert_eq!(nodes[2].id, "node-2");
    }

    #[test]
    fn test_text_before_first_heading() {
        let nodes = chunker(1200, 0).chunk("preamble line\n# Title\nbody");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].section, None);
        assert_eq!(nodes[0].text, "preamble line");
    }

    #[test]
    fn test_long_section_repeats_heading() {
        let mut text = String::from("## Experience\n");
        for i in 0..20 {
            text.push_str(&format!("- Role number {} at Company {} doing interesting work\n", i, i));
        }

        let nodes = chunker(200, 0).chunk(&text);

        assert!(nodes.len() > 1);
        for node in &nodes {
            assert!(node.text.starts_with("## Experience\n"), "{}", node.text);
            assert!(char_len(&node.text) <= 200, "node too long: {}", char_len(&node.text));
            assert_eq!(node.section.as_deref(), Some("Experience"));
        }

        // 모든 항목이 정확히 한 번씩 포함
        for i in 0..20 {
            let needle = format!("Role number {} at", i);
            assert_eq!(nodes.iter().filter(|n| n.text.contains(&needle)).count(), 1);
        }
    }

    #[test]
    fn test_long_line_splits_on_words() {
        let words: Vec<String> = (0..100).map(|i| format!("word{}", i)).collect();
        let text = format!("## About\n{}", words.join(" "));

        let nodes = chunker(120, 0).chunk(&text);
        assert!(nodes.len() > 1);
        for node in &nodes {
            assert!(char_len(&node.text) <= 120);
        }
        assert!(nodes.last().map(|n| n.text.ends_with("word99")).unwrap_or(false));
    }

    #[test]
    fn test_limits_count_characters_not_bytes() {
        let text = format!("## 소개\n{}", "가".repeat(40));
        assert!(text.len() > 50);

        let nodes = chunker(50, 0).chunk(&text);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, text);
    }

    #[test]
    fn test_oversized_word_kept_whole() {
        let long_word = "x".repeat(300);
        let nodes = chunker(100, 0).chunk(&format!("## Other\n{}", long_word));
        assert!(nodes.iter().any(|n| n.text.contains(&long_word)));
    }

    #[test]
    fn test_merge_small_pieces() {
        let chunker = chunker(500, 100);
        let merged = chunker.merge_small_pieces(
            vec!["Short 1.".to_string(), "Short 2.".to_string(), "Short 3.".to_string()],
            500,
        );
        assert_eq!(merged, vec!["Short 1.\nShort 2.\nShort 3.".to_string()]);
    }

    #[test]
    fn test_mock_profile_chunks() {
        let profile = LinkedInProfile::mock().expect("mock profile");
        let markdown = profile.to_markdown();

        let nodes = section_chunker(1200).chunk(&markdown);
        let sections: Vec<&str> = nodes.iter().filter_map(|n| n.section.as_deref()).collect();

        assert!(sections.contains(&"Jordan Rivera"));
        assert!(sections.contains(&"Experience"));
        assert!(sections.contains(&"Education"));
        assert!(nodes.iter().all(|n| char_len(&n.text) <= 1200));
    }
}
