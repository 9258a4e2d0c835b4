//! Error taxonomy for the search boundary.
//!
//! Upload-side problems are reported as per-file [`UploadOutcome`] values
//! rather than errors, so a batch never aborts on one bad file; see
//! [`crate::ingest`]. Search needs real error types because callers must
//! tell validation failures (no remote call was made) apart from execution
//! failures (the remote call for one strategy failed).
//!
//! [`UploadOutcome`]: crate::models::UploadOutcome

use thiserror::Error;

use crate::models::SearchStrategy;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("unknown search strategy: '{0}'. Use semantic, hybrid, or merged.")]
    UnknownStrategy(String),

    /// The remote call for one strategy failed. Carries the strategy's
    /// identity so a caller comparing several strategies can still render
    /// the ones that succeeded.
    #[error("search failed for strategy '{strategy}': {source}")]
    Execution {
        strategy: SearchStrategy,
        #[source]
        source: anyhow::Error,
    },
}

impl SearchError {
    /// True for errors raised before any remote call was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SearchError::EmptyQuery | SearchError::UnknownStrategy(_)
        )
    }
}
