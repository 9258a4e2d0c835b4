//! # KB Bridge
//!
//! A thin CLI/REST bridge over a hosted knowledge-base search service.
//!
//! KB Bridge uploads local documents to the KB service idempotently
//! (content-hash skip, bounded concurrent fan-out, adaptive completion
//! polling), issues semantic, hybrid, and rank-fused searches against the
//! indexed corpus, and renders results through a REST endpoint, a CLI
//! chatbot, and a browser dashboard for side-by-side strategy comparison.
//! All indexing and retrieval computation happens on the KB service; this
//! crate owns only the workflow around it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Local files │──▶│ BatchUploader │──▶│ KB service  │
//! │  (data/)    │   │ hash+ledger  │   │ (hosted)    │
//! └─────────────┘   └──────┬───────┘   └──────┬──────┘
//!                          │                  │
//!                    SQLite ledger       search calls
//!                                             │
//!                      ┌──────────┬───────────┤
//!                      ▼          ▼           ▼
//!                 ┌──────────┐ ┌──────┐ ┌───────────┐
//!                 │   CLI    │ │ REST │ │ Dashboard │
//!                 │  (kbb)   │ │      │ │           │
//!                 └──────────┘ └──────┘ └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kbb init                      # create the upload ledger
//! kbb upload                    # index the data folder
//! kbb search "deployment" --strategy merged
//! kbb ask "What is covered?"    # one-shot question
//! kbb chat                      # interactive loop
//! kbb serve                     # REST API + dashboard
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fingerprint`] | Content hashing for change detection |
//! | [`ledger`] | Durable path → (fingerprint, remote id) table |
//! | [`remote`] | KB service client |
//! | [`poller`] | Completion polling with adaptive backoff |
//! | [`ingest`] | Batch upload orchestration |
//! | [`search`] | Strategy dispatch and rank fusion |
//! | [`cache`] | Bounded comparison cache |
//! | [`server`] | REST API and dashboard |
//! | [`chat`] | CLI chatbot |

pub mod cache;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod ledger;
pub mod models;
pub mod poller;
pub mod remote;
pub mod search;
pub mod server;
