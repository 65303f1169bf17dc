//! Knowledge 모듈 - 프로필 노드 분할 + 세션별 벡터 인덱스
//!
//! - Chunker: Markdown 섹션 인식 노드 분할
//! - Index: 인메모리 코사인 유사도 검색 + 임베딩 검증

mod chunker;
mod index;

// Re-exports
pub use chunker::{section_chunker, ChunkConfig, Chunker, ProfileNode, SectionChunker};
pub use index::{cosine_similarity, EmbeddingReport, ProfileIndex, ScoredNode};
