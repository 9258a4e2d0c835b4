//! Durable upload ledger: path → (fingerprint, remote id).
//!
//! The ledger is what makes re-uploads idempotent. A record with a non-NULL
//! `remote_id` means "this fingerprint finished processing on the KB service";
//! anything else means the file must be (re-)submitted. Each write touches a
//! single row via UPSERT, so a crash mid-batch leaves every other record
//! intact.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::FileRecord;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            fingerprint TEXT NOT NULL,
            remote_id TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn lookup(pool: &SqlitePool, path: &str) -> Result<Option<FileRecord>> {
    let row = sqlx::query(
        "SELECT path, fingerprint, remote_id, updated_at FROM files WHERE path = ?",
    )
    .bind(path)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| FileRecord {
        path: r.get("path"),
        fingerprint: r.get("fingerprint"),
        remote_id: r.get("remote_id"),
        updated_at: r.get("updated_at"),
    }))
}

/// Record the fingerprint that is about to be (or was just) submitted.
///
/// Clears any previous `remote_id`: the record is unconfirmed until the
/// processing job for this fingerprint succeeds.
pub async fn record_fingerprint(pool: &SqlitePool, path: &str, fingerprint: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO files (path, fingerprint, remote_id, updated_at) VALUES (?, ?, NULL, ?)
        ON CONFLICT(path) DO UPDATE SET
            fingerprint = excluded.fingerprint,
            remote_id = NULL,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(path)
    .bind(fingerprint)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Tie a ledger entry to a known-good remote resource.
///
/// The `fingerprint` guard in the WHERE clause means a stale completion can
/// never overwrite a newer fingerprint written by a concurrent re-run.
/// Returns whether the record was actually confirmed.
pub async fn confirm_remote_id(
    pool: &SqlitePool,
    path: &str,
    fingerprint: &str,
    remote_id: &str,
) -> Result<bool> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE files SET remote_id = ?, updated_at = ? WHERE path = ? AND fingerprint = ?",
    )
    .bind(remote_id)
    .bind(now)
    .bind(path)
    .bind(fingerprint)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
