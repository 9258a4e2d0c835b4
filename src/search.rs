//! Search dispatch and rank fusion.
//!
//! Validates queries, maps each strategy onto the KB service's search
//! features, and normalizes the results:
//!
//! - `semantic` — one remote call on the semantic channel.
//! - `hybrid` — one remote call with semantic + full-text together; the
//!   service blends, we dedup duplicate hits by max score.
//! - `merged` — separate semantic and full-text calls issued concurrently,
//!   fused client-side with reciprocal-rank fusion.
//!
//! An empty result list is a valid outcome, not an error. A failing remote
//! call surfaces as [`SearchError::Execution`] carrying the strategy's
//! identity, so comparison callers can still render the strategies that
//! succeeded.

use std::collections::HashMap;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::models::{ComparisonEntry, SearchResult, SearchStrategy, StrategyOutcome};
use crate::remote::{KbClient, SearchFeature};

/// Run one strategy for a query. Validation happens before any remote call.
pub async fn dispatch(
    client: &dyn KbClient,
    config: &SearchConfig,
    query: &str,
    strategy: SearchStrategy,
) -> Result<Vec<SearchResult>, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let page_size = config.page_size;
    let exec_err = |source: anyhow::Error| SearchError::Execution { strategy, source };

    match strategy {
        SearchStrategy::Semantic => {
            let mut results = client
                .search(query, &[SearchFeature::Semantic], page_size)
                .await
                .map_err(exec_err)?;
            results.truncate(page_size);
            Ok(results)
        }
        SearchStrategy::Hybrid => {
            // Over-fetch so max-score dedup across the two channels still
            // fills a page.
            let results = client
                .search(
                    query,
                    &[SearchFeature::Semantic, SearchFeature::Fulltext],
                    page_size * 2,
                )
                .await
                .map_err(exec_err)?;
            Ok(dedup_max_score(results, page_size))
        }
        SearchStrategy::Merged => {
            let (semantic, fulltext) = tokio::join!(
                client.search(query, &[SearchFeature::Semantic], page_size * 2),
                client.search(query, &[SearchFeature::Fulltext], page_size * 2),
            );
            let semantic = semantic.map_err(exec_err)?;
            let fulltext = fulltext.map_err(exec_err)?;
            Ok(fuse_reciprocal_rank(
                &[semantic, fulltext],
                config.rrf_k,
                page_size,
            ))
        }
    }
}

/// Parse a strategy name and dispatch. Used by the REST and CLI boundaries
/// where the strategy arrives as a string.
pub async fn dispatch_named(
    client: &dyn KbClient,
    config: &SearchConfig,
    query: &str,
    strategy: &str,
) -> Result<Vec<SearchResult>, SearchError> {
    let strategy = SearchStrategy::parse(strategy)
        .ok_or_else(|| SearchError::UnknownStrategy(strategy.to_string()))?;
    dispatch(client, config, query, strategy).await
}

/// Run every strategy for one query, concurrently. Per-strategy failures
/// are recorded next to the successes; only validation errors (which apply
/// to every strategy equally) abort the comparison.
pub async fn compare(
    client: &dyn KbClient,
    config: &SearchConfig,
    query: &str,
) -> Result<ComparisonEntry, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let (semantic, hybrid, merged) = tokio::join!(
        dispatch(client, config, query, SearchStrategy::Semantic),
        dispatch(client, config, query, SearchStrategy::Hybrid),
        dispatch(client, config, query, SearchStrategy::Merged),
    );

    let mut entry = ComparisonEntry::new();
    for (strategy, result) in SearchStrategy::ALL.into_iter().zip([semantic, hybrid, merged]) {
        let outcome = match result {
            Ok(results) => StrategyOutcome::Ok { results },
            Err(e) => StrategyOutcome::Failed {
                error: e.to_string(),
            },
        };
        entry.insert(strategy.as_str().to_string(), outcome);
    }

    Ok(entry)
}

/// Collapse duplicate hits (same source and text, surfaced by both search
/// channels) keeping the higher score, then rank by score descending.
fn dedup_max_score(hits: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut deduped: Vec<SearchResult> = Vec::with_capacity(hits.len());
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for hit in hits {
        let key = (hit.source.clone(), hit.text.clone());
        match index.get(&key) {
            Some(&i) => {
                if hit.score > deduped[i].score {
                    deduped[i].score = hit.score;
                }
            }
            None => {
                index.insert(key, deduped.len());
                deduped.push(hit);
            }
        }
    }

    sort_by_score(&mut deduped);
    deduped.truncate(limit);
    deduped
}

/// Reciprocal-rank fusion: each hit contributes `1 / (k + rank)` per list
/// it appears in (rank is 1-based), summed over lists. Deterministic; ties
/// keep first-seen order, so the earlier list wins them.
pub fn fuse_reciprocal_rank(
    lists: &[Vec<SearchResult>],
    k: f64,
    limit: usize,
) -> Vec<SearchResult> {
    let mut fused: Vec<(SearchResult, f64)> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for list in lists {
        for (rank, hit) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f64 + 1.0);
            let key = (hit.source.clone(), hit.text.clone());
            match index.get(&key) {
                Some(&i) => fused[i].1 += contribution,
                None => {
                    index.insert(key, fused.len());
                    fused.push((hit.clone(), contribution));
                }
            }
        }
    }

    // Stable sort: equal fused scores keep input (semantic-first) order.
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);

    fused
        .into_iter()
        .map(|(mut hit, score)| {
            hit.score = score;
            hit
        })
        .collect()
}

/// CLI entry point: run one strategy and print ranked results.
pub async fn run_search(
    config: &crate::config::Config,
    query: &str,
    strategy: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let client = crate::remote::HttpKbClient::new(&config.remote)?;

    let mut search_config = config.search.clone();
    if let Some(limit) = limit {
        search_config.page_size = limit;
    }

    let results = dispatch_named(&client, &search_config, query, strategy).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, result.score, result.source);
        println!("    \"{}\"", result.text.replace('\n', " ").trim());
        println!();
    }

    Ok(())
}

fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
