//! 로컬 해싱 임베딩
//!
//! 단어를 SHA-256으로 해싱해 부호 있는 버킷에 누적하는 feature hashing 방식입니다.
//! 의미 유사도는 없지만 단어 겹침은 잡아내므로 API 키 없는 데모와 테스트에 씁니다.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;

/// 로컬 해싱 임베딩 구현체
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// 텍스트 하나를 벡터로 변환
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);

            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }

        vector
    }
}

/// 소문자 영숫자 토큰 (한 글자 토큰 제외)
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "local-hash"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashEmbedding::new(128);
        let a = embedder.embed_text("Senior Platform Engineer");
        let b = embedder.embed_text("senior platform engineer!");

        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_blank_text_is_zero() {
        let embedder = HashEmbedding::new(16);
        assert!(embedder.embed_text("  a  ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_overlap_scores_higher() {
        let embedder = HashEmbedding::new(1024);
        let query = embedder.embed_text("kafka streaming platform");
        let related = embedder.embed_text("built a kafka streaming platform for events");
        let unrelated = embedder.embed_text("volunteer mentor teaching high school students");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<String> = tokenize("C++ and Rust, 2021 a").collect();
        assert_eq!(tokens, vec!["and", "rust", "2021"]);
    }
}
