//! Batch upload orchestration.
//!
//! Coordinates the full upload flow: enumerate candidate files → fingerprint
//! and ledger skip-check → bounded concurrent submission → completion
//! polling → ledger confirmation. Unchanged files cost zero remote calls,
//! and one file's failure never aborts its siblings: every file gets its own
//! [`UploadOutcome`], reported in enumeration order.

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, UploadConfig};
use crate::db;
use crate::fingerprint;
use crate::ledger;
use crate::models::{IngestJob, JobState, UploadOutcome, UploadStatus};
use crate::poller;
use crate::remote::{HttpKbClient, KbClient};

/// Upload every candidate file under the configured data directory.
///
/// Files whose current fingerprint matches a confirmed ledger entry are
/// skipped without any remote call. The rest are submitted concurrently,
/// bounded by `upload.max_in_flight`, so the wall-clock cost of a batch
/// approaches the slowest single file rather than the sum of all files.
///
/// When `wait` is true each accepted submission is polled to a terminal
/// state and the ledger is confirmed only on success; when false,
/// acceptance by the service is treated as confirmation.
pub async fn upload_folder(
    config: &Config,
    client: &dyn KbClient,
    pool: &SqlitePool,
    wait: bool,
) -> Result<Vec<UploadOutcome>> {
    let files = enumerate_files(&config.upload)?;

    let mut outcomes: Vec<Option<UploadOutcome>> = vec![None; files.len()];
    let mut pending: Vec<(usize, PathBuf, String)> = Vec::new();

    for (idx, path) in files.iter().enumerate() {
        let key = ledger_key(path);
        match fingerprint::fingerprint_file(path) {
            Err(e) => {
                outcomes[idx] = Some(UploadOutcome {
                    path: key,
                    status: UploadStatus::Failed,
                    detail: Some(format!("{:#}", e)),
                });
            }
            Ok(fp) => match ledger::lookup(pool, &key).await? {
                Some(record) if record.fingerprint == fp && record.remote_id.is_some() => {
                    outcomes[idx] = Some(UploadOutcome {
                        path: key,
                        status: UploadStatus::Skipped,
                        detail: record.remote_id,
                    });
                }
                _ => pending.push((idx, path.clone(), fp)),
            },
        }
    }

    let completed: Vec<(usize, UploadOutcome)> =
        stream::iter(pending.into_iter().map(|(idx, path, fp)| async move {
            let outcome = upload_one(config, client, pool, &path, &fp, wait).await;
            (idx, outcome)
        }))
        .buffer_unordered(config.upload.max_in_flight)
        .collect()
        .await;

    for (idx, outcome) in completed {
        outcomes[idx] = Some(outcome);
    }

    Ok(outcomes
        .into_iter()
        .map(|o| o.expect("every enumerated file receives an outcome"))
        .collect())
}

/// Submit one file, then poll and confirm. Every failure mode collapses to
/// an [`UploadOutcome`] so the caller's fan-out never sees an error.
async fn upload_one(
    config: &Config,
    client: &dyn KbClient,
    pool: &SqlitePool,
    path: &Path,
    fingerprint: &str,
    wait: bool,
) -> UploadOutcome {
    let key = ledger_key(path);
    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| key.clone());
    let slug = slug_from_path(path);

    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => return failed(key, format!("Failed to read file: {}", e)),
    };

    let mut job = match client.submit_file(&slug, &title, fingerprint, bytes).await {
        Ok(handle) => IngestJob {
            path: path.to_path_buf(),
            handle,
            state: JobState::Submitted,
        },
        Err(e) => return failed(key, format!("Submission failed: {:#}", e)),
    };

    // The fingerprint lands in the ledger right after submission. A crash
    // from here on costs at most one redundant re-submission on the next
    // run; it can never leave the ledger claiming an index state the
    // service does not have.
    if let Err(e) = ledger::record_fingerprint(pool, &key, fingerprint).await {
        return failed(key, format!("Ledger write failed: {:#}", e));
    }

    if !wait {
        // Not awaiting processing: treat acceptance as confirmation so the
        // next run still skips this content.
        return match ledger::confirm_remote_id(pool, &key, fingerprint, &job.handle.resource_id)
            .await
        {
            Ok(_) => UploadOutcome {
                path: key,
                status: UploadStatus::Uploaded,
                detail: Some(job.handle.resource_id),
            },
            Err(e) => failed(key, format!("Ledger write failed: {:#}", e)),
        };
    }

    job.state = JobState::Polling;
    job.state = poller::await_completion(client, &job.handle, &config.poll).await;
    debug_assert!(job.state.is_terminal());

    match job.state {
        JobState::Succeeded => {
            match ledger::confirm_remote_id(pool, &key, fingerprint, &job.handle.resource_id).await
            {
                Ok(_) => UploadOutcome {
                    path: key,
                    status: UploadStatus::Uploaded,
                    detail: Some(job.handle.resource_id),
                },
                Err(e) => failed(key, format!("Ledger write failed: {:#}", e)),
            }
        }
        JobState::Failed { reason } => failed(key, reason),
        JobState::TimedOut => UploadOutcome {
            path: key,
            status: UploadStatus::TimedOut,
            detail: Some(format!(
                "processing did not finish within {}s",
                config.poll.max_wait_secs
            )),
        },
        state => failed(key, format!("unexpected non-terminal job state: {:?}", state)),
    }
}

fn failed(path: String, detail: String) -> UploadOutcome {
    UploadOutcome {
        path,
        status: UploadStatus::Failed,
        detail: Some(detail),
    }
}

fn ledger_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Enumerate candidate files under the data directory, sorted for
/// deterministic outcome ordering. Non-recursive unless configured
/// otherwise; only files matching the include globs are candidates.
pub fn enumerate_files(config: &UploadConfig) -> Result<Vec<PathBuf>> {
    if !config.data_dir.exists() {
        bail!("Data directory not found: {}", config.data_dir.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut files = Vec::new();

    if config.recursive {
        for entry in WalkDir::new(&config.data_dir) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&config.data_dir)
                .unwrap_or(entry.path());
            if include_set.is_match(relative) {
                files.push(entry.path().to_path_buf());
            }
        }
    } else {
        for entry in std::fs::read_dir(&config.data_dir)
            .with_context(|| format!("Failed to list {}", config.data_dir.display()))?
        {
            let entry = entry?;
            // Directories are skipped; anything else that matches stays a
            // candidate, and unreadable entries fail per-file later.
            if entry.file_type()?.is_dir() {
                continue;
            }
            if include_set.is_match(entry.file_name().to_string_lossy().as_ref()) {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Stable slug for the remote resource, derived from the file stem so that
/// re-uploads of changed content update the same resource instead of
/// creating a new one.
pub fn slug_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let mut slug: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    slug.make_ascii_lowercase();
    slug
}

/// CLI entry point: run a batch upload and print per-file outcomes.
pub async fn run_upload(config: &Config, dir: Option<PathBuf>, wait: bool) -> Result<()> {
    let mut config = config.clone();
    if let Some(dir) = dir {
        config.upload.data_dir = dir;
    }

    let client = HttpKbClient::new(&config.remote)?;
    let pool = db::connect(&config.ledger.path).await?;
    ledger::run_migrations(&pool).await?;

    let outcomes = upload_folder(&config, &client, &pool, wait).await?;

    println!("upload {}", config.upload.data_dir.display());
    if outcomes.is_empty() {
        println!("  no matching files");
        println!("ok");
        pool.close().await;
        return Ok(());
    }

    for outcome in &outcomes {
        match outcome.status {
            UploadStatus::Uploaded | UploadStatus::Skipped => println!(
                "  {:<9} {} → {}",
                outcome.status,
                outcome.path,
                outcome.detail.as_deref().unwrap_or("-")
            ),
            UploadStatus::Failed | UploadStatus::TimedOut => println!(
                "  {:<9} {}: {}",
                outcome.status,
                outcome.path,
                outcome.detail.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    let count = |status: UploadStatus| outcomes.iter().filter(|o| o.status == status).count();
    println!("  files found: {}", outcomes.len());
    println!("  uploaded: {}", count(UploadStatus::Uploaded));
    println!("  skipped: {}", count(UploadStatus::Skipped));
    println!("  failed: {}", count(UploadStatus::Failed));
    println!("  timed out: {}", count(UploadStatus::TimedOut));
    println!("ok");

    pool.close().await;
    Ok(())
}
