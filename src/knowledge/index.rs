//! Profile Index - 세션별 인메모리 벡터 인덱스
//!
//! 프로필 하나에서 나오는 노드는 수십 개 수준이므로
//! 코사인 유사도 전수 비교로 top-k를 구합니다.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;

use super::chunker::ProfileNode;

// ============================================================================
// Types
// ============================================================================

/// 임베딩이 붙은 노드
#[derive(Debug, Clone)]
struct IndexedNode {
    node: ProfileNode,
    embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone, Serialize)]
pub struct ScoredNode {
    pub node: ProfileNode,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub score: f32,
}

/// 임베딩 검증 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingReport {
    /// 전체 노드 수
    pub total: usize,
    /// 임베딩이 비어 있는 노드 수
    pub missing: usize,
    /// 차원 불일치, 비유한 값, 영벡터인 노드 수
    pub invalid: usize,
}

impl EmbeddingReport {
    pub fn is_healthy(&self) -> bool {
        self.missing == 0 && self.invalid == 0
    }
}

// ============================================================================
// ProfileIndex
// ============================================================================

/// 프로필 인덱스
#[derive(Debug, Clone)]
pub struct ProfileIndex {
    nodes: Vec<IndexedNode>,
    dimension: usize,
    embedder: String,
}

impl ProfileIndex {
    /// 노드를 임베딩하여 인덱스 생성
    ///
    /// 모든 노드 텍스트를 한 번의 배치로 임베딩합니다.
    pub async fn build(nodes: Vec<ProfileNode>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        if nodes.is_empty() {
            bail!("Cannot build an index without nodes");
        }

        let texts: Vec<String> = nodes.iter().map(|n| n.text.clone()).collect();
        let embeddings = embedder
            .embed_documents(&texts)
            .await
            .context("Failed to embed profile nodes")?;

        if embeddings.len() != nodes.len() {
            bail!(
                "Embedder {} returned {} vectors for {} nodes",
                embedder.name(),
                embeddings.len(),
                nodes.len()
            );
        }

        // 차원을 모르는 프로바이더는 첫 번째 벡터 길이를 따름
        let dimension = match embedder.dimension() {
            0 => embeddings.iter().map(Vec::len).find(|len| *len > 0).unwrap_or(0),
            known => known,
        };

        tracing::info!(
            "Built profile index: {} nodes (embedder={}, dimension={})",
            nodes.len(),
            embedder.name(),
            dimension
        );

        Ok(Self::from_parts(nodes, embeddings, dimension, embedder.name()))
    }

    /// 이미 계산된 임베딩으로 생성
    pub fn from_parts(
        nodes: Vec<ProfileNode>,
        embeddings: Vec<Vec<f32>>,
        dimension: usize,
        embedder: &str,
    ) -> Self {
        let nodes = nodes
            .into_iter()
            .zip(embeddings)
            .map(|(node, embedding)| IndexedNode { node, embedding })
            .collect();

        Self {
            nodes,
            dimension,
            embedder: embedder.to_string(),
        }
    }

    /// 노드 수
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 임베딩 차원
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 인덱스를 만든 임베딩 프로바이더 이름
    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    /// 노드 목록
    pub fn nodes(&self) -> impl Iterator<Item = &ProfileNode> {
        self.nodes.iter().map(|n| &n.node)
    }

    /// 임베딩 검증
    pub fn verify_embeddings(&self) -> EmbeddingReport {
        let mut report = EmbeddingReport {
            total: self.nodes.len(),
            ..Default::default()
        };

        for indexed in &self.nodes {
            let embedding = &indexed.embedding;
            if embedding.is_empty() {
                report.missing += 1;
            } else if embedding.len() != self.dimension
                || embedding.iter().any(|v| !v.is_finite())
                || embedding.iter().all(|v| *v == 0.0)
            {
                report.invalid += 1;
            }
        }

        if !report.is_healthy() {
            tracing::warn!(
                "Embedding check: {} missing, {} invalid of {} nodes",
                report.missing,
                report.invalid,
                report.total
            );
        } else {
            tracing::debug!("Embedding check passed for {} nodes", report.total);
        }

        report
    }

    /// 유사도 검색
    ///
    /// 점수 내림차순, 동점은 노드 순서대로 반환합니다.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<ScoredNode> {
        if top_k == 0 {
            return vec![];
        }

        let mut scored: Vec<ScoredNode> = self
            .nodes
            .iter()
            .map(|indexed| ScoredNode {
                node: indexed.node.clone(),
                score: cosine_similarity(query_embedding, &indexed.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 길이가 다르거나, 비어 있거나, 영벡터이면 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedding;

    fn node(i: usize, text: &str) -> ProfileNode {
        ProfileNode {
            id: format!("node-{}", i),
            section: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.0001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.0001);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_score_then_position() {
        let index = ProfileIndex::from_parts(
            vec![node(0, "a"), node(1, "b"), node(2, "c"), node(3, "d")],
            vec![
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![2.0, 0.0],
            ],
            2,
            "test",
        );

        let results = index.search(&[1.0, 0.0], 3);
        let ids: Vec<&str> = results.iter().map(|r| r.node.id.as_str()).collect();
        assert_eq!(ids, vec!["node-1", "node-3", "node-2"]);

        assert!(index.search(&[1.0, 0.0], 0).is_empty());
        assert_eq!(index.search(&[1.0, 0.0], 10).len(), 4);
    }

    #[test]
    fn test_verify_embeddings() {
        let index = ProfileIndex::from_parts(
            vec![node(0, "a"), node(1, "b"), node(2, "c"), node(3, "d"), node(4, "e")],
            vec![
                vec![0.5, 0.5],
                vec![],
                vec![0.0, 0.0],
                vec![1.0],
                vec![f32::NAN, 1.0],
            ],
            2,
            "test",
        );

        let report = index.verify_embeddings();
        assert_eq!(report, EmbeddingReport { total: 5, missing: 1, invalid: 3 });
        assert!(!report.is_healthy());
    }

    #[tokio::test]
    async fn test_build_with_hash_embedding() {
        let embedder = HashEmbedding::new(1024);
        let nodes = vec![
            node(0, "Director of Developer Relations at Northwind Cloud"),
            node(1, "Bachelor of Science in Computer Science at McGill University"),
            node(2, "Skills: Apache Kafka, PostgreSQL, Rust"),
        ];

        let index = ProfileIndex::build(nodes, &embedder).await.expect("index");
        assert_eq!(index.len(), 3);
        assert!(index.verify_embeddings().is_healthy());

        let query = embedder.embed_query("McGill University computer science degree").await.expect("query");
        let top = index.search(&query, 1);
        assert_eq!(top[0].node.id, "node-1");
    }

    #[tokio::test]
    async fn test_build_rejects_empty_nodes() {
        let embedder = HashEmbedding::new(64);
        assert!(ProfileIndex::build(vec![], &embedder).await.is_err());
    }
}
