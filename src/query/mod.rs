//! Query 모듈 - 검색 + 프롬프트 구성 + 답변 생성
//!
//! 질문을 임베딩해 세션 인덱스에서 top-k 노드를 찾고,
//! 그 노드들을 컨텍스트로 템플릿을 채워 LLM에 보냅니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{ProfileIndex, ScoredNode};
use crate::llm::{GenerationParams, LlmProvider};

// ============================================================================
// Prompt Templates
// ============================================================================

/// 초기 사실 3가지 생성 템플릿
pub const INITIAL_FACTS_TEMPLATE: &str = "\
You are an AI assistant that provides detailed answers based on the provided context.

Context information is below:

{context_str}

Based on the context provided, list 3 interesting facts about this person's career or education.

Answer in detail, using only the information provided in the context.";

/// 사용자 질문 답변 템플릿
pub const USER_QUESTION_TEMPLATE: &str = "\
You are an AI assistant that provides detailed answers to questions based on the provided context.

Context information is below:

{context_str}

Question: {query_str}

Answer in full details, using only the information provided in the context. \
If the answer is not available in the context, say \"I don't know. The information is not available on the LinkedIn page.\"";

/// 초기 사실 검색에 쓰는 고정 질의
const INITIAL_FACTS_QUERY: &str = "career history, current role, education and notable accomplishments";

/// 템플릿 채우기
pub fn render_prompt(template: &str, context: &str, query: Option<&str>) -> String {
    let prompt = template.replace("{context_str}", context);
    match query {
        Some(q) => prompt.replace("{query_str}", q),
        None => prompt,
    }
}

/// 검색 결과를 컨텍스트 문자열로 (순위 순, 빈 줄 구분)
pub fn build_context(nodes: &[ScoredNode]) -> String {
    nodes
        .iter()
        .map(|n| n.node.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// Types
// ============================================================================

/// 질문 답변 결과
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub response: String,
    pub sources: Vec<ScoredNode>,
}

// ============================================================================
// QueryEngine
// ============================================================================

/// 질의 엔진
pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
    temperature: f32,
    max_tokens: u32,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            llm,
            top_k,
            temperature: 0.0,
            max_tokens: 500,
        }
    }

    /// 샘플링 설정
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    fn params(&self, model: &str) -> GenerationParams {
        GenerationParams {
            model: model.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// 인덱스에서 질의와 가까운 노드 검색
    pub async fn retrieve(&self, index: &ProfileIndex, query: &str) -> Result<Vec<ScoredNode>> {
        let query_embedding = self
            .embedder
            .embed_query(query)
            .await
            .context("Failed to embed query")?;

        Ok(index.search(&query_embedding, self.top_k))
    }

    /// 프로필에 대한 흥미로운 사실 3가지 생성
    pub async fn generate_initial_facts(&self, index: &ProfileIndex, model: &str) -> Result<String> {
        let nodes = self.retrieve(index, INITIAL_FACTS_QUERY).await?;
        let prompt = render_prompt(INITIAL_FACTS_TEMPLATE, &build_context(&nodes), None);

        let facts = self
            .llm
            .complete(&prompt, &self.params(model))
            .await
            .context("Failed to generate initial facts")?;

        tracing::info!("Generated initial facts ({} context nodes, model={})", nodes.len(), model);
        Ok(facts)
    }

    /// 사용자 질문에 답변
    pub async fn answer_user_query(
        &self,
        index: &ProfileIndex,
        question: &str,
        model: &str,
    ) -> Result<Answer> {
        let sources = self.retrieve(index, question).await?;
        let prompt = render_prompt(USER_QUESTION_TEMPLATE, &build_context(&sources), Some(question));

        let response = self
            .llm
            .complete(&prompt, &self.params(model))
            .await
            .context("Failed to answer question")?;

        tracing::info!("Answered question ({} context nodes, model={})", sources.len(), model);
        Ok(Answer { response, sources })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::embedding::HashEmbedding;
    use crate::knowledge::{section_chunker, Chunker, ProfileNode};
    use crate::profile::LinkedInProfile;

    /// 받은 프롬프트를 기록하고 고정 응답을 돌려주는 LLM
    struct RecordingLlm {
        reply: String,
        prompts: Mutex<Vec<(String, GenerationParams)>>,
    }

    impl RecordingLlm {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), params.clone()));
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    async fn mock_index(embedder: &HashEmbedding) -> ProfileIndex {
        let profile = LinkedInProfile::mock().unwrap();
        let nodes = section_chunker(1200).chunk(&profile.to_markdown());
        ProfileIndex::build(nodes, embedder).await.unwrap()
    }

    #[test]
    fn test_render_prompt() {
        let prompt = render_prompt(USER_QUESTION_TEMPLATE, "CTX", Some("Q?"));
        assert!(prompt.contains("Context information is below:\n\nCTX\n\nQuestion: Q?"));
        assert!(prompt.contains("I don't know. The information is not available on the LinkedIn page."));
        assert!(!prompt.contains("{context_str}"));
        assert!(!prompt.contains("{query_str}"));

        let facts = render_prompt(INITIAL_FACTS_TEMPLATE, "CTX", None);
        assert!(facts.contains("list 3 interesting facts"));
    }

    #[test]
    fn test_build_context_keeps_rank_order() {
        let nodes = vec![
            ScoredNode {
                node: ProfileNode { id: "node-2".into(), section: None, text: "second\n".into() },
                score: 0.9,
            },
            ScoredNode {
                node: ProfileNode { id: "node-0".into(), section: None, text: "first".into() },
                score: 0.1,
            },
        ];
        assert_eq!(build_context(&nodes), "second\n\nfirst");
        assert_eq!(build_context(&[]), "");
    }

    #[tokio::test]
    async fn test_answer_user_query_uses_retrieved_context() {
        let embedder = HashEmbedding::new(1024);
        let index = mock_index(&embedder).await;
        let llm = Arc::new(RecordingLlm::new("They studied at McGill University."));

        let engine = QueryEngine::new(Arc::new(embedder), llm.clone(), 2).with_sampling(0.2, 300);
        let answer = engine
            .answer_user_query(&index, "Which university: McGill? Computer Science degree", "model-x")
            .await
            .unwrap();

        assert_eq!(answer.response, "They studied at McGill University.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].node.section.as_deref(), Some("Education"));

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let (prompt, params) = &prompts[0];
        assert!(prompt.contains("McGill University"));
        assert!(prompt.contains("Question: Which university: McGill? Computer Science degree"));
        assert_eq!(params.model, "model-x");
        assert_eq!(params.max_tokens, 300);
        assert!((params.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_generate_initial_facts() {
        let embedder = HashEmbedding::new(1024);
        let index = mock_index(&embedder).await;
        let llm = Arc::new(RecordingLlm::new("1. Fact\n2. Fact\n3. Fact"));

        let engine = QueryEngine::new(Arc::new(embedder), llm.clone(), 5);
        let facts = engine.generate_initial_facts(&index, "model-y").await.unwrap();

        assert_eq!(facts, "1. Fact\n2. Fact\n3. Fact");
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].0.contains("list 3 interesting facts"));
        assert!(!prompts[0].0.contains("Question:"));
    }
}
