//! The retrieval engine: expansion, ranking, aggregation, evidence
//! assembly, and optional answer synthesis, with a full audit trace.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use memoir_core::config::RetrievalConfig;
use memoir_core::error::{MemoirError, Result};
use memoir_extract::embedder::{DynTextEmbedder, TextEmbedder};
use memoir_extract::retry::RetryPolicy;
use memoir_graph::MemoryGraph;

use crate::aggregate::{aggregate, AggregationMode};
use crate::evidence::{assemble, EvidenceItem};
use crate::expand::{expansion_set, DynQueryExpander, QueryExpander};
use crate::rank::rank_nodes;

/// Per-question retrieval parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrieveOptions {
    pub query_num: usize,
    pub topk: usize,
    pub mode: AggregationMode,
    pub min_relevance: f64,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            query_num: 3,
            topk: 5,
            mode: AggregationMode::Argmax,
            min_relevance: 0.05,
        }
    }
}

impl RetrieveOptions {
    /// Build options from the configuration section.
    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        let mode = AggregationMode::from_name(&config.mode).ok_or_else(|| {
            MemoirError::Config(format!("unknown aggregation mode '{}'", config.mode))
        })?;
        let options = Self {
            query_num: config.query_num,
            topk: config.topk,
            mode,
            min_relevance: config.min_relevance,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.query_num == 0 {
            return Err(MemoirError::Config(
                "query_num must be at least 1".to_string(),
            ));
        }
        if self.topk == 0 {
            return Err(MemoirError::Config("topk must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Audit trace of one question's retrieval run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub question: String,
    /// The candidate queries actually ranked.
    pub queries: Vec<String>,
    pub evidence: Vec<EvidenceItem>,
    /// The synthesized answer, absent when the question was unanswerable.
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of `answer_with_retrieval`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RetrievalOutcome {
    Answered { answer: String, session: Session },
    /// The graph holds no relevant evidence. Synthesis was never invoked.
    Unanswerable { session: Session },
}

impl RetrievalOutcome {
    pub fn session(&self) -> &Session {
        match self {
            RetrievalOutcome::Answered { session, .. } => session,
            RetrievalOutcome::Unanswerable { session } => session,
        }
    }
}

// ---------------------------------------------------------------------------
// Answer synthesis collaborator
// ---------------------------------------------------------------------------

/// Collaborator producing the final answer from assembled evidence.
///
/// Must tolerate arbitrarily large evidence lists (context handling is its
/// problem) and an empty list (the engine avoids calling it with one).
pub trait AnswerSynthesizer: Send + Sync {
    fn synthesize(
        &self,
        question: &str,
        evidence: &[EvidenceItem],
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Object-safe twin of [`AnswerSynthesizer`].
pub trait DynAnswerSynthesizer: Send + Sync {
    fn synthesize_boxed<'a>(
        &'a self,
        question: &'a str,
        evidence: &'a [EvidenceItem],
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

impl<T: AnswerSynthesizer> DynAnswerSynthesizer for T {
    fn synthesize_boxed<'a>(
        &'a self,
        question: &'a str,
        evidence: &'a [EvidenceItem],
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.synthesize(question, evidence))
    }
}

/// Deterministic extractive synthesizer, for tests and the model-free CLI.
#[derive(Debug, Clone, Default)]
pub struct MockSynthesizer;

impl MockSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl AnswerSynthesizer for MockSynthesizer {
    async fn synthesize(&self, question: &str, evidence: &[EvidenceItem]) -> Result<String> {
        if evidence.is_empty() {
            return Ok(format!("No memories bear on \"{}\".", question));
        }
        let timeline: Vec<&str> = evidence.iter().map(|e| e.text.as_str()).collect();
        Ok(format!(
            "Drawing on {} memories: {}",
            evidence.len(),
            timeline.join(" | ")
        ))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Read-only retrieval over a graph snapshot.
pub struct RetrievalEngine {
    embedder: Box<dyn DynTextEmbedder>,
    expander: Box<dyn DynQueryExpander>,
    synthesizer: Box<dyn DynAnswerSynthesizer>,
    retry: RetryPolicy,
}

impl RetrievalEngine {
    pub fn new(
        embedder: impl TextEmbedder + 'static,
        expander: impl QueryExpander + 'static,
        synthesizer: impl AnswerSynthesizer + 'static,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder: Box::new(embedder),
            expander: Box::new(expander),
            synthesizer: Box::new(synthesizer),
            retry,
        }
    }

    /// Expand, rank, aggregate, and assemble the evidence set for one
    /// question against a graph snapshot.
    pub async fn retrieve(
        &self,
        graph: &MemoryGraph,
        question: &str,
        options: &RetrieveOptions,
    ) -> Result<Vec<EvidenceItem>> {
        let (evidence, _queries) = self.retrieve_traced(graph, question, options).await?;
        Ok(evidence)
    }

    /// Answer a question over the graph, or report it unanswerable.
    ///
    /// The returned session records the expanded queries, the assembled
    /// evidence, and the answer, whatever the outcome.
    pub async fn answer_with_retrieval(
        &self,
        graph: &MemoryGraph,
        question: &str,
        options: &RetrieveOptions,
    ) -> Result<RetrievalOutcome> {
        let (evidence, queries) = self.retrieve_traced(graph, question, options).await?;

        let mut session = Session {
            id: Uuid::new_v4(),
            question: question.to_string(),
            queries,
            evidence: evidence.clone(),
            answer: None,
            created_at: Utc::now(),
        };

        if evidence.is_empty() {
            info!(question, "No relevant evidence; question is unanswerable");
            return Ok(RetrievalOutcome::Unanswerable { session });
        }

        let answer = self
            .retry
            .run("answer synthesis", || {
                self.synthesizer.synthesize_boxed(question, &evidence)
            })
            .await
            .map_err(|err| MemoirError::Synthesis(err.to_string()))?;

        session.answer = Some(answer.clone());
        info!(question, evidence = evidence.len(), "Question answered");
        Ok(RetrievalOutcome::Answered { answer, session })
    }

    async fn retrieve_traced(
        &self,
        graph: &MemoryGraph,
        question: &str,
        options: &RetrieveOptions,
    ) -> Result<(Vec<EvidenceItem>, Vec<String>)> {
        options.validate()?;
        if question.trim().is_empty() {
            return Err(MemoirError::Retrieval("empty question".to_string()));
        }

        let queries =
            expansion_set(self.expander.as_ref(), question, options.query_num).await?;

        let mut per_query = Vec::with_capacity(queries.len());
        for query in &queries {
            let query_embedding = self
                .retry
                .run("query embedding", || self.embedder.embed_boxed(query))
                .await
                .map_err(|err| {
                    MemoirError::Retrieval(format!("query embedding failed: {}", err))
                })?;
            let ranked = rank_nodes(
                graph,
                &query_embedding,
                query,
                options.topk,
                options.min_relevance,
            );
            debug!(query, candidates = ranked.len(), "Query ranked");
            per_query.push(ranked);
        }

        let selected = aggregate(options.mode, &per_query, options.topk);
        let evidence = assemble(graph, &selected);
        debug!(
            queries = queries.len(),
            selected = selected.len(),
            evidence = evidence.len(),
            "Evidence assembled"
        );
        Ok((evidence, queries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use memoir_core::types::{ClipId, Embedding};
    use memoir_extract::embedder::MockTextEmbedder;
    use memoir_graph::MemoryStatement;

    use crate::expand::MockQueryExpander;

    fn engine() -> RetrievalEngine {
        RetrievalEngine::new(
            MockTextEmbedder::new(),
            MockQueryExpander::new(),
            MockSynthesizer::new(),
            RetryPolicy::none(),
        )
    }

    fn options() -> RetrieveOptions {
        RetrieveOptions::default()
    }

    /// Graph whose statements are embedded with the same mock embedder the
    /// engine uses, so exact question matches rank at 1.0.
    async fn seeded_graph(statements: &[(u64, &str)]) -> MemoryGraph {
        let embedder = MockTextEmbedder::new();
        let mut graph = MemoryGraph::new();
        for (clip, text) in statements {
            let embedding = embedder.embed(text).await.unwrap();
            graph
                .append_clip(
                    ClipId(*clip),
                    vec![MemoryStatement::new(*text, Some(embedding))],
                    &BTreeSet::new(),
                )
                .unwrap();
        }
        graph
    }

    #[tokio::test]
    async fn test_retrieve_finds_exact_match() {
        let graph = seeded_graph(&[
            (0, "the lighthouse keeper trims the wick"),
            (1, "a ferry crosses the strait"),
        ])
        .await;

        let evidence = engine()
            .retrieve(&graph, "the lighthouse keeper trims the wick", &options())
            .await
            .unwrap();
        assert!(!evidence.is_empty());
        assert_eq!(evidence[0].clip_id, Some(ClipId(0)));
    }

    #[tokio::test]
    async fn test_retrieve_is_deterministic() {
        let graph = seeded_graph(&[
            (0, "morning market opens"),
            (1, "fishermen unload crates"),
            (2, "gulls circle the pier"),
        ])
        .await;

        let e = engine();
        let first = e
            .retrieve(&graph, "what happened at the pier", &options())
            .await
            .unwrap();
        let second = e
            .retrieve(&graph, "what happened at the pier", &options())
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_topk_larger_than_graph() {
        let graph = seeded_graph(&[(0, "only memory")]).await;
        let mut opts = options();
        opts.topk = 50;
        opts.min_relevance = 0.0;

        let evidence = engine()
            .retrieve(&graph, "only memory", &opts)
            .await
            .unwrap();
        assert_eq!(evidence.len(), 1);
    }

    #[tokio::test]
    async fn test_query_num_zero_rejected() {
        let graph = MemoryGraph::new();
        let mut opts = options();
        opts.query_num = 0;

        let err = engine()
            .retrieve(&graph, "anything", &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoirError::Config(_)));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let graph = MemoryGraph::new();
        let err = engine().retrieve(&graph, "  ", &options()).await.unwrap_err();
        assert!(matches!(err, MemoirError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_unanswerable_on_empty_graph() {
        let graph = MemoryGraph::new();
        let outcome = engine()
            .answer_with_retrieval(&graph, "who rang the bell", &options())
            .await
            .unwrap();
        match outcome {
            RetrievalOutcome::Unanswerable { session } => {
                assert!(session.evidence.is_empty());
                assert!(session.answer.is_none());
                assert_eq!(session.question, "who rang the bell");
            }
            other => panic!("expected Unanswerable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unanswerable_below_relevance_floor() {
        // Hash embeddings of unrelated texts sit near zero similarity; a
        // floor of 0.5 is far above that noise band.
        let graph = seeded_graph(&[(0, "a quiet street at dusk")]).await;
        let mut opts = options();
        opts.min_relevance = 0.5;
        let outcome = engine()
            .answer_with_retrieval(&graph, "completely unrelated question", &opts)
            .await
            .unwrap();
        assert!(matches!(outcome, RetrievalOutcome::Unanswerable { .. }));
    }

    #[tokio::test]
    async fn test_answered_session_records_trace() {
        let graph = seeded_graph(&[(0, "the parade turns the corner")]).await;
        let outcome = engine()
            .answer_with_retrieval(&graph, "the parade turns the corner", &options())
            .await
            .unwrap();
        match outcome {
            RetrievalOutcome::Answered { answer, session } => {
                assert!(!answer.is_empty());
                assert_eq!(session.answer.as_deref(), Some(answer.as_str()));
                assert_eq!(session.queries.len(), 3);
                assert_eq!(session.evidence.len(), 1);
            }
            other => panic!("expected Answered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_num_one_uses_question_only() {
        let graph = seeded_graph(&[(0, "a kite tangles in the oak")]).await;
        let mut opts = options();
        opts.query_num = 1;

        let outcome = engine()
            .answer_with_retrieval(&graph, "a kite tangles in the oak", &opts)
            .await
            .unwrap();
        assert_eq!(outcome.session().queries, vec!["a kite tangles in the oak"]);
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_terminal_error() {
        struct BrokenSynthesizer;
        impl AnswerSynthesizer for BrokenSynthesizer {
            async fn synthesize(
                &self,
                _question: &str,
                _evidence: &[EvidenceItem],
            ) -> Result<String> {
                Err(MemoirError::Transient("model endpoint down".into()))
            }
        }

        let graph = seeded_graph(&[(0, "the band tunes up")]).await;
        let engine = RetrievalEngine::new(
            MockTextEmbedder::new(),
            MockQueryExpander::new(),
            BrokenSynthesizer,
            RetryPolicy::none(),
        );

        let err = engine
            .answer_with_retrieval(&graph, "the band tunes up", &options())
            .await
            .unwrap_err();
        // Distinct from unanswerable: a terminal synthesis error.
        assert!(matches!(err, MemoirError::Synthesis(_)));
    }

    #[tokio::test]
    async fn test_options_from_config() {
        let config = RetrievalConfig::default();
        let opts = RetrieveOptions::from_config(&config).unwrap();
        assert_eq!(opts.mode, AggregationMode::Argmax);
        assert_eq!(opts.query_num, 3);
    }

    #[tokio::test]
    async fn test_options_from_config_bad_mode() {
        let config = RetrievalConfig {
            mode: "median".to_string(),
            ..RetrievalConfig::default()
        };
        assert!(RetrieveOptions::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_session_serializes() {
        let graph = seeded_graph(&[(0, "fireworks over the bay")]).await;
        let outcome = engine()
            .answer_with_retrieval(&graph, "fireworks over the bay", &options())
            .await
            .unwrap();
        let json = serde_json::to_string(outcome.session()).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, outcome.session());
    }
}
