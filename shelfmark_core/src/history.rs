//! Loan history loading across the live ledger and the CSV archive.
//!
//! Queries merge both sources within a cutoff window so the caller sees
//! one timeline regardless of when loans were archived.

use crate::{LoanRecord, Result};
use chrono::{DateTime, Duration, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// CSV row format for reading archived loans
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    isbn: String,
    member_id: String,
    borrowed_at: String,
    returned_at: Option<String>,
}

impl TryFrom<CsvRow> for LoanRecord {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| crate::Error::Other(format!("Invalid UUID: {}", e)))?;

        let borrowed_at = DateTime::parse_from_rfc3339(&row.borrowed_at)
            .map_err(|e| crate::Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        let returned_at = row
            .returned_at
            .as_ref()
            .filter(|s| !s.is_empty())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(LoanRecord {
            id,
            isbn: row.isbn,
            member_id: row.member_id,
            borrowed_at,
            returned_at,
        })
    }
}

/// Load loans from the last N days from both ledger and CSV archive
///
/// Returns loans sorted by borrowed_at (newest first).
/// Automatically deduplicates loans that appear in both sources.
pub fn load_recent_loans(
    ledger_path: &Path,
    csv_path: &Path,
    days: i64,
) -> Result<Vec<LoanRecord>> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut loans = Vec::new();
    let mut seen_ids = HashSet::new();

    // Load from the live ledger first
    if ledger_path.exists() {
        let ledger_loans = crate::ledger::read_loans(ledger_path)?;
        for loan in ledger_loans {
            if loan.borrowed_at >= cutoff {
                seen_ids.insert(loan.id);
                loans.push(loan);
            }
        }
        tracing::debug!("Loaded {} loans from ledger", loans.len());
    }

    // Load from the CSV archive
    if csv_path.exists() {
        let csv_loans = load_loans_from_csv(csv_path)?;
        let mut csv_count = 0;
        for loan in csv_loans {
            if loan.borrowed_at >= cutoff && !seen_ids.contains(&loan.id) {
                seen_ids.insert(loan.id);
                loans.push(loan);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} loans from CSV archive", csv_count);
    }

    // Sort by borrowed_at, newest first
    loans.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));

    tracing::info!("Loaded {} total loans from last {} days", loans.len(), days);

    Ok(loans)
}

/// Load all loans from a CSV archive file
fn load_loans_from_csv(path: &Path) -> Result<Vec<LoanRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut loans = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match LoanRecord::try_from(row) {
                Ok(loan) => loans.push(loan),
                Err(e) => {
                    tracing::warn!("Failed to parse CSV row: {}", e);
                    // Continue processing other rows
                }
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
            }
        }
    }

    Ok(loans)
}

/// Find the open loan for a given copy, if any
pub fn find_open_loan<'a>(loans: &'a [LoanRecord], isbn: &str) -> Option<&'a LoanRecord> {
    loans.iter().find(|loan| loan.is_open() && loan.isbn == isbn)
}
