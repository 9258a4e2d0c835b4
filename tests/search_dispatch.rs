//! Tests for strategy dispatch, validation, and the comparison flow, with
//! the KB service stubbed out behind the client trait.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use kb_bridge::config::SearchConfig;
use kb_bridge::error::SearchError;
use kb_bridge::models::{JobHandle, SearchResult, SearchStrategy, StrategyOutcome};
use kb_bridge::remote::{KbClient, RemoteJobStatus, SearchFeature};
use kb_bridge::search::{compare, dispatch, dispatch_named};

fn hit(text: &str, score: f64, source: &str) -> SearchResult {
    SearchResult {
        text: text.to_string(),
        score,
        source: source.to_string(),
    }
}

/// Serves canned results per feature set and counts remote calls.
#[derive(Default)]
struct MockSearch {
    calls: AtomicUsize,
    semantic: Vec<SearchResult>,
    fulltext: Vec<SearchResult>,
    blended: Vec<SearchResult>,
    /// Fail calls that request exactly this feature set.
    fail_features: Option<Vec<SearchFeature>>,
}

#[async_trait]
impl KbClient for MockSearch {
    async fn submit_file(
        &self,
        _slug: &str,
        _title: &str,
        _fingerprint: &str,
        _bytes: Vec<u8>,
    ) -> Result<JobHandle> {
        unimplemented!("not used by search tests")
    }

    async fn job_status(&self, _handle: &JobHandle) -> Result<RemoteJobStatus> {
        unimplemented!("not used by search tests")
    }

    async fn search(
        &self,
        _query: &str,
        features: &[SearchFeature],
        _top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failing) = &self.fail_features {
            if failing.as_slice() == features {
                bail!("simulated service outage");
            }
        }

        Ok(match features {
            [SearchFeature::Semantic] => self.semantic.clone(),
            [SearchFeature::Fulltext] => self.fulltext.clone(),
            [SearchFeature::Semantic, SearchFeature::Fulltext] => self.blended.clone(),
            other => bail!("unexpected feature set: {:?}", other),
        })
    }
}

fn config() -> SearchConfig {
    SearchConfig {
        page_size: 5,
        rrf_k: 60.0,
    }
}

#[tokio::test]
async fn empty_query_is_rejected_before_any_remote_call() {
    let mock = MockSearch::default();
    let err = dispatch(&mock, &config(), "   ", SearchStrategy::Merged)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::EmptyQuery));
    assert!(err.is_validation());
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_strategy_is_rejected_before_any_remote_call() {
    let mock = MockSearch::default();
    let err = dispatch_named(&mock, &config(), "q", "bogus")
        .await
        .unwrap_err();
    match &err {
        SearchError::UnknownStrategy(name) => assert_eq!(name, "bogus"),
        other => panic!("expected UnknownStrategy, got {:?}", other),
    }
    assert!(err.is_validation());
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn semantic_strategy_passes_results_through() {
    let mock = MockSearch {
        semantic: vec![hit("first", 0.9, "d1"), hit("second", 0.7, "d2")],
        ..MockSearch::default()
    };

    let results = dispatch(&mock, &config(), "q", SearchStrategy::Semantic)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "first");
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_results_are_a_valid_outcome() {
    let mock = MockSearch::default();
    for strategy in SearchStrategy::ALL {
        let results = dispatch(&mock, &config(), "nothing matches", strategy)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}

#[tokio::test]
async fn hybrid_dedups_duplicate_hits_by_max_score() {
    let mock = MockSearch {
        blended: vec![
            hit("same passage", 0.4, "d1"),
            hit("other", 0.6, "d2"),
            hit("same passage", 0.8, "d1"),
        ],
        ..MockSearch::default()
    };

    let results = dispatch(&mock, &config(), "q", SearchStrategy::Hybrid)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "same passage");
    assert!((results[0].score - 0.8).abs() < 1e-9);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn merged_issues_both_calls_and_fuses() {
    let mock = MockSearch {
        semantic: vec![hit("shared", 0.9, "d1"), hit("sem only", 0.8, "d2")],
        fulltext: vec![hit("ft only", 14.0, "d3"), hit("shared", 9.0, "d1")],
        ..MockSearch::default()
    };

    let results = dispatch(&mock, &config(), "q", SearchStrategy::Merged)
        .await
        .unwrap();

    // One semantic call plus one full-text call.
    assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
    // The hit present in both ranked lists wins.
    assert_eq!(results[0].text, "shared");
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn merged_failure_carries_the_strategy_identity() {
    let mock = MockSearch {
        semantic: vec![hit("a", 0.9, "d1")],
        fail_features: Some(vec![SearchFeature::Fulltext]),
        ..MockSearch::default()
    };

    let err = dispatch(&mock, &config(), "q", SearchStrategy::Merged)
        .await
        .unwrap_err();
    match err {
        SearchError::Execution { strategy, .. } => assert_eq!(strategy, SearchStrategy::Merged),
        other => panic!("expected Execution, got {:?}", other),
    }
}

#[tokio::test]
async fn compare_isolates_a_failing_strategy() {
    let mock = MockSearch {
        semantic: vec![hit("sem", 0.9, "d1")],
        blended: vec![hit("blend", 0.8, "d1")],
        fulltext: Vec::new(),
        fail_features: Some(vec![SearchFeature::Fulltext]),
        ..MockSearch::default()
    };

    let entry = compare(&mock, &config(), "q").await.unwrap();

    match &entry["semantic"] {
        StrategyOutcome::Ok { results } => assert_eq!(results.len(), 1),
        other => panic!("semantic should succeed, got {:?}", other),
    }
    match &entry["hybrid"] {
        StrategyOutcome::Ok { results } => assert_eq!(results.len(), 1),
        other => panic!("hybrid should succeed, got {:?}", other),
    }
    // Merged needs the full-text channel, which is down.
    match &entry["merged"] {
        StrategyOutcome::Failed { error } => {
            assert!(error.contains("merged"), "error: {}", error)
        }
        other => panic!("merged should fail, got {:?}", other),
    }
}

#[tokio::test]
async fn compare_distinguishes_no_results_from_failure() {
    let mock = MockSearch::default();
    let entry = compare(&mock, &config(), "q").await.unwrap();

    for (name, outcome) in &entry {
        match outcome {
            StrategyOutcome::Ok { results } => assert!(results.is_empty()),
            StrategyOutcome::Failed { error } => {
                panic!("strategy {} should not fail: {}", name, error)
            }
        }
    }
}

#[tokio::test]
async fn compare_rejects_empty_queries() {
    let mock = MockSearch::default();
    let err = compare(&mock, &config(), "").await.unwrap_err();
    assert!(matches!(err, SearchError::EmptyQuery));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}
