//! Core data types used throughout kb-bridge.
//!
//! These types represent the upload ledger records, in-flight ingest jobs,
//! and search results that flow between the uploader, the poller, and the
//! presentation surfaces.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A row in the upload ledger.
///
/// `remote_id` is `None` until the corresponding processing job has been
/// confirmed successful for exactly this fingerprint.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: String,
    pub fingerprint: String,
    pub remote_id: Option<String>,
    pub updated_at: i64,
}

/// Handle for a remote processing job, returned by file submission.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub resource_id: String,
    pub job_id: String,
}

/// Lifecycle state of one ingest job.
///
/// `Submitted → Polling → {Succeeded | Failed | TimedOut}`; terminal states
/// are final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling,
    Succeeded,
    Failed { reason: String },
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed { .. } | JobState::TimedOut
        )
    }
}

/// An in-flight upload for one file. Ephemeral: owned by the batch that
/// created it and discarded when the batch completes.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct IngestJob {
    pub path: PathBuf,
    pub handle: JobHandle,
    pub state: JobState,
}

/// Per-file result of a batch upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    Skipped,
    Failed,
    TimedOut,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Skipped => "skipped",
            UploadStatus::Failed => "failed",
            UploadStatus::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub path: String,
    pub status: UploadStatus,
    /// Remote resource id for uploaded/skipped files, error detail for
    /// failed ones.
    pub detail: Option<String>,
}

/// One search hit as served by the KB service and passed through to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f64,
    pub source: String,
}

/// The recognized search modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Vector-only retrieval on the KB service.
    Semantic,
    /// Service-side semantic + full-text blend in a single call.
    Hybrid,
    /// Client-side rank fusion of separate semantic and full-text calls.
    Merged,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 3] = [
        SearchStrategy::Semantic,
        SearchStrategy::Hybrid,
        SearchStrategy::Merged,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "semantic" => Some(SearchStrategy::Semantic),
            "hybrid" => Some(SearchStrategy::Hybrid),
            "merged" => Some(SearchStrategy::Merged),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Semantic => "semantic",
            SearchStrategy::Hybrid => "hybrid",
            SearchStrategy::Merged => "merged",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one strategy inside a comparison: either its ranked
/// hits or the error it produced. Keeping the error per strategy lets the
/// dashboard show "strategy failed" next to siblings that succeeded, and
/// keeps "no results" distinguishable from "failed".
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StrategyOutcome {
    Ok { results: Vec<SearchResult> },
    Failed { error: String },
}

/// Cached comparison value: strategy name → outcome, ordered for stable JSON.
pub type ComparisonEntry = BTreeMap<String, StrategyOutcome>;
