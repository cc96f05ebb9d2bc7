//! SQLite persistence of a reconciliation report.
//!
//! ```sql
//! CREATE TABLE exact_matches (row_idx, raw_title, title_norm, year, canonical_title, route, matched_key, via_parenthetical);
//! CREATE TABLE provisional_matches (row_idx, raw_title, title_norm, year, candidate_key, candidate_title, score, above_threshold);
//! CREATE TABLE unmatched (row_idx, raw_title, title_norm, year, candidate_key, candidate_title, score);
//! ```
//!
//! `provisional_matches` rows are inserted least confident first, and
//! `review_rank` preserves that order for readers. `unmatched` carries the
//! best below-threshold candidate when there was one, NULLs otherwise.

use anyhow::Result;
use rusqlite::{params, Connection};

use crate::models::{MatchResult, ReconciliationReport};
use crate::progress::{create_progress_bar, log_progress};

const WRITE_BATCH_SIZE: usize = 10_000;

pub const SCHEMA: &str = "
    CREATE TABLE exact_matches (
        row_idx INTEGER PRIMARY KEY,
        raw_title TEXT,
        title_norm TEXT,
        year INTEGER NOT NULL,
        canonical_title TEXT NOT NULL,
        route TEXT NOT NULL,
        matched_key TEXT NOT NULL,
        via_parenthetical INTEGER NOT NULL
    );

    CREATE TABLE provisional_matches (
        row_idx INTEGER PRIMARY KEY,
        review_rank INTEGER NOT NULL,
        raw_title TEXT,
        title_norm TEXT,
        year INTEGER NOT NULL,
        candidate_key TEXT NOT NULL,
        candidate_title TEXT NOT NULL,
        score REAL NOT NULL,
        above_threshold INTEGER NOT NULL
    );

    CREATE TABLE unmatched (
        row_idx INTEGER PRIMARY KEY,
        raw_title TEXT,
        title_norm TEXT,
        year INTEGER NOT NULL,
        candidate_key TEXT,
        candidate_title TEXT,
        score REAL
    );

    CREATE TABLE run_stats (
        json TEXT NOT NULL
    );

    CREATE INDEX idx_provisional_score ON provisional_matches(score);
";

/// Create the schema and write every partition of `report`.
pub fn write_report(conn: &mut Connection, report: &ReconciliationReport) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    conn.execute_batch(SCHEMA)?;

    let total = report.total() as u64;
    let pb = create_progress_bar(total, "Writing report");
    let mut written = 0u64;

    for chunk in report.matched.chunks(WRITE_BATCH_SIZE) {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO exact_matches
                 (row_idx, raw_title, title_norm, year, canonical_title, route, matched_key, via_parenthetical)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (record, hit) in chunk {
                stmt.execute(params![
                    record.row as i64,
                    record.raw_title,
                    record.normalized_title,
                    record.year,
                    hit.canonical_title,
                    hit.route.as_str(),
                    hit.matched_key,
                    hit.via_parenthetical,
                ])?;
                written += 1;
                pb.inc(1);
                log_progress("write", written, total, 5_000);
            }
        }
        tx.commit()?;
    }

    for (chunk_idx, chunk) in report.provisional.chunks(WRITE_BATCH_SIZE).enumerate() {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO provisional_matches
                 (row_idx, review_rank, raw_title, title_norm, year, candidate_key, candidate_title, score, above_threshold)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (i, (record, hit)) in chunk.iter().enumerate() {
                stmt.execute(params![
                    record.row as i64,
                    (chunk_idx * WRITE_BATCH_SIZE + i) as i64,
                    record.raw_title,
                    record.normalized_title,
                    record.year,
                    hit.candidate_key,
                    hit.candidate_title,
                    hit.score,
                    hit.above_threshold,
                ])?;
                written += 1;
                pb.inc(1);
                log_progress("write", written, total, 5_000);
            }
        }
        tx.commit()?;
    }

    for chunk in report.unmatched.chunks(WRITE_BATCH_SIZE) {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO unmatched
                 (row_idx, raw_title, title_norm, year, candidate_key, candidate_title, score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (record, result) in chunk {
                let weak = match result {
                    MatchResult::Similarity(hit) => Some(hit),
                    _ => None,
                };
                stmt.execute(params![
                    record.row as i64,
                    record.raw_title,
                    record.normalized_title,
                    record.year,
                    weak.map(|hit| hit.candidate_key.as_str()),
                    weak.map(|hit| hit.candidate_title.as_str()),
                    weak.map(|hit| hit.score),
                ])?;
                written += 1;
                pb.inc(1);
                log_progress("write", written, total, 5_000);
            }
        }
        tx.commit()?;
    }

    conn.execute(
        "INSERT INTO run_stats (json) VALUES (?1)",
        [serde_json::to_string(&report.stats)?],
    )?;

    pb.finish_with_message(format!("Wrote {} records", written));
    Ok(())
}
