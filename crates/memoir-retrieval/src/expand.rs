//! Query expansion: one question becomes several candidate phrasings.
//!
//! A single phrasing misses statements worded differently, so the engine
//! asks a collaborator for `query_num` reformulations. With `query_num == 1`
//! the collaborator is bypassed and the question stands alone.

use std::future::Future;
use std::pin::Pin;

use memoir_core::error::Result;

/// Collaborator producing candidate reformulations of a question.
pub trait QueryExpander: Send + Sync {
    /// Produce up to `count` reformulations. The engine pads or truncates,
    /// so returning fewer or more is not an error.
    fn expand(
        &self,
        question: &str,
        count: usize,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Object-safe twin of [`QueryExpander`].
pub trait DynQueryExpander: Send + Sync {
    fn expand_boxed<'a>(
        &'a self,
        question: &'a str,
        count: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;
}

impl<T: QueryExpander> DynQueryExpander for T {
    fn expand_boxed<'a>(
        &'a self,
        question: &'a str,
        count: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>> {
        Box::pin(self.expand(question, count))
    }
}

/// Deterministic template-based expander, for tests and the model-free CLI.
///
/// The first candidate is always the question itself; the rest refocus it
/// on a fixed facet rotation.
#[derive(Debug, Clone, Default)]
pub struct MockQueryExpander;

const FACETS: [&str; 4] = [
    "who was involved",
    "what happened and in what order",
    "where it took place",
    "what objects were present",
];

impl MockQueryExpander {
    pub fn new() -> Self {
        Self
    }
}

impl QueryExpander for MockQueryExpander {
    async fn expand(&self, question: &str, count: usize) -> Result<Vec<String>> {
        let mut queries = Vec::with_capacity(count);
        if count > 0 {
            queries.push(question.to_string());
        }
        for i in 1..count {
            queries.push(format!("{} ({})", question, FACETS[(i - 1) % FACETS.len()]));
        }
        Ok(queries)
    }
}

/// Resolve the final candidate query list: delegate to the collaborator,
/// pad with the original question when it under-delivers, truncate when it
/// over-delivers. `query_num == 1` degrades to the question itself without
/// a collaborator call.
pub async fn expansion_set(
    expander: &dyn DynQueryExpander,
    question: &str,
    query_num: usize,
) -> Result<Vec<String>> {
    if query_num <= 1 {
        return Ok(vec![question.to_string()]);
    }
    let mut queries = expander.expand_boxed(question, query_num).await?;
    queries.truncate(query_num);
    while queries.len() < query_num {
        queries.push(question.to_string());
    }
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_expander_first_is_question() {
        let queries = MockQueryExpander::new()
            .expand("who fed the cat", 3)
            .await
            .unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0], "who fed the cat");
        assert_ne!(queries[1], queries[2]);
    }

    #[tokio::test]
    async fn test_mock_expander_deterministic() {
        let e = MockQueryExpander::new();
        let a = e.expand("q", 4).await.unwrap();
        let b = e.expand("q", 4).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_expansion_set_single_bypasses_collaborator() {
        struct Panicking;
        impl QueryExpander for Panicking {
            async fn expand(&self, _q: &str, _n: usize) -> Result<Vec<String>> {
                panic!("must not be called for query_num == 1");
            }
        }
        let queries = expansion_set(&Panicking, "plain question", 1).await.unwrap();
        assert_eq!(queries, vec!["plain question"]);
    }

    #[tokio::test]
    async fn test_expansion_set_pads_short_results() {
        struct Short;
        impl QueryExpander for Short {
            async fn expand(&self, q: &str, _n: usize) -> Result<Vec<String>> {
                Ok(vec![format!("{} rephrased", q)])
            }
        }
        let queries = expansion_set(&Short, "q", 3).await.unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0], "q rephrased");
        assert_eq!(queries[1], "q");
        assert_eq!(queries[2], "q");
    }

    #[tokio::test]
    async fn test_expansion_set_truncates_long_results() {
        struct Chatty;
        impl QueryExpander for Chatty {
            async fn expand(&self, q: &str, _n: usize) -> Result<Vec<String>> {
                Ok((0..10).map(|i| format!("{} v{}", q, i)).collect())
            }
        }
        let queries = expansion_set(&Chatty, "q", 2).await.unwrap();
        assert_eq!(queries.len(), 2);
    }
}
