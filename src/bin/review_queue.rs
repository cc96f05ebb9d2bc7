//! Print the provisional matches of a reconciled database for human review.

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::{params, Connection, OpenFlags};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "review-queue")]
#[command(about = "List similarity matches awaiting review, least confident first")]
struct Args {
    /// Database written by movie-reconcile
    db: PathBuf,

    #[arg(long, default_value = "0.0")]
    min_score: f64,

    #[arg(long, default_value = "1.0")]
    max_score: f64,

    #[arg(long, default_value = "50")]
    limit: usize,

    /// Also list unmatched titles with their best weak candidate, if any
    #[arg(long)]
    unmatched: bool,
}

fn print_provisional(conn: &Connection, args: &Args) -> Result<()> {
    println!(
        "\nProvisional matches with score in [{:.2}, {:.2}]:",
        args.min_score, args.max_score
    );
    println!("{:-<80}", "");

    let mut stmt = conn.prepare(
        "SELECT row_idx, raw_title, year, candidate_title, score
         FROM provisional_matches
         WHERE score >= ?1 AND score <= ?2
         ORDER BY review_rank
         LIMIT ?3",
    )?;
    let mut rows = stmt.query(params![args.min_score, args.max_score, args.limit as i64])?;
    let mut count = 0;

    while let Some(row) = rows.next()? {
        let row_idx: i64 = row.get(0)?;
        let raw_title: Option<String> = row.get(1)?;
        let year: i32 = row.get(2)?;
        let candidate: String = row.get(3)?;
        let score: f64 = row.get(4)?;

        println!(
            "[{}] {} ({}) -> {} score={:.3}",
            row_idx,
            raw_title.unwrap_or_else(|| "<missing>".to_string()),
            year,
            candidate,
            score
        );
        count += 1;
    }

    if count == 0 {
        println!("No provisional matches in range.");
    }
    Ok(())
}

fn print_unmatched(conn: &Connection, limit: usize) -> Result<()> {
    println!("\nUnmatched titles:");
    println!("{:-<80}", "");

    let mut stmt = conn.prepare(
        "SELECT row_idx, raw_title, year, candidate_title, score
         FROM unmatched
         ORDER BY score DESC, row_idx
         LIMIT ?1",
    )?;
    let mut rows = stmt.query([limit as i64])?;
    let mut count = 0;

    while let Some(row) = rows.next()? {
        let row_idx: i64 = row.get(0)?;
        let raw_title: Option<String> = row.get(1)?;
        let year: i32 = row.get(2)?;
        let candidate: Option<String> = row.get(3)?;
        let score: Option<f64> = row.get(4)?;

        let best = match (candidate, score) {
            (Some(candidate), Some(score)) => format!(" best: {} score={:.3}", candidate, score),
            _ => " no same-year candidate".to_string(),
        };
        println!(
            "[{}] {} ({}){}",
            row_idx,
            raw_title.unwrap_or_else(|| "<missing>".to_string()),
            year,
            best
        );
        count += 1;
    }

    if count == 0 {
        println!("No unmatched titles.");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let conn = Connection::open_with_flags(&args.db, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {}", args.db.display()))?;

    let stats: Option<String> = conn
        .query_row("SELECT json FROM run_stats LIMIT 1", [], |r| r.get(0))
        .ok();
    if let Some(json) = stats {
        println!("Run statistics:\n{}", json);
    }

    print_provisional(&conn, &args)?;
    if args.unmatched {
        print_unmatched(&conn, args.limit)?;
    }
    Ok(())
}
