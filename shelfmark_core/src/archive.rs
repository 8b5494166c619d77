//! CSV archival for closed loans.
//!
//! Closed ledger rows are appended to a CSV archive; open loans must stay
//! live, so the ledger is compacted in place rather than renamed away.

use crate::{LoanRecord, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    isbn: String,
    member_id: String,
    borrowed_at: String,
    returned_at: Option<String>,
}

impl From<&LoanRecord> for CsvRow {
    fn from(loan: &LoanRecord) -> Self {
        CsvRow {
            id: loan.id.to_string(),
            isbn: loan.isbn.clone(),
            member_id: loan.member_id.clone(),
            borrowed_at: loan.borrowed_at.to_rfc3339(),
            returned_at: loan.returned_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Archive closed loans into CSV and compact the ledger
///
/// This function:
/// 1. Reads all loans from the ledger
/// 2. Appends the closed ones to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Rewrites the ledger atomically with only the still-open loans
/// 5. Returns the number of loans archived
///
/// # Safety
/// - CSV is fsynced before the ledger is rewritten
/// - Open loans never leave the ledger
pub fn ledger_to_csv_and_archive(ledger_path: &Path, csv_path: &Path) -> Result<usize> {
    let loans = crate::ledger::read_loans(ledger_path)?;

    let (closed, open): (Vec<_>, Vec<_>) = loans.into_iter().partition(|loan| !loan.is_open());

    if closed.is_empty() {
        tracing::info!("No closed loans in ledger to archive");
        return Ok(0);
    }

    // Ensure parent directory exists
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Open CSV file for appending
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Headers only when the file is empty; appending must not repeat them
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for loan in &closed {
        writer.serialize(CsvRow::from(loan))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} loans to CSV archive", closed.len());

    // Compact the ledger down to the open loans
    crate::ledger::rewrite_loans(ledger_path, &open)?;
    tracing::info!("Compacted ledger to {} open loans", open.len());

    Ok(closed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{read_loans, JsonlLedger, LoanSink};
    use chrono::Utc;

    fn open_loan(isbn: &str) -> LoanRecord {
        LoanRecord::open(isbn, "m1", Utc::now())
    }

    fn closed_loan(isbn: &str) -> LoanRecord {
        let mut loan = open_loan(isbn);
        loan.returned_at = Some(Utc::now());
        loan
    }

    #[test]
    fn test_archive_creates_csv_and_keeps_open_loans() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("loans.jsonl");
        let csv_path = temp_dir.path().join("loans.csv");

        let mut ledger = JsonlLedger::new(&ledger_path);
        ledger.append(&closed_loan("1111")).unwrap();
        ledger.append(&closed_loan("2222")).unwrap();
        ledger.append(&open_loan("3333")).unwrap();

        let count = ledger_to_csv_and_archive(&ledger_path, &csv_path).unwrap();
        assert_eq!(count, 2);
        assert!(csv_path.exists());

        // Open loan stays in the ledger
        let remaining = read_loans(&ledger_path).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].isbn, "3333");
    }

    #[test]
    fn test_archive_appends_without_duplicate_headers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("loans.jsonl");
        let csv_path = temp_dir.path().join("loans.csv");

        let mut ledger = JsonlLedger::new(&ledger_path);
        ledger.append(&closed_loan("1111")).unwrap();
        assert_eq!(ledger_to_csv_and_archive(&ledger_path, &csv_path).unwrap(), 1);

        let mut ledger = JsonlLedger::new(&ledger_path);
        ledger.append(&closed_loan("2222")).unwrap();
        assert_eq!(ledger_to_csv_and_archive(&ledger_path, &csv_path).unwrap(), 1);

        let reader = csv::Reader::from_path(&csv_path).unwrap();
        let record_count = reader.into_records().count();
        assert_eq!(record_count, 2);
    }

    #[test]
    fn test_archive_with_only_open_loans() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("loans.jsonl");
        let csv_path = temp_dir.path().join("loans.csv");

        let mut ledger = JsonlLedger::new(&ledger_path);
        ledger.append(&open_loan("1111")).unwrap();

        let count = ledger_to_csv_and_archive(&ledger_path, &csv_path).unwrap();
        assert_eq!(count, 0);
        assert!(!csv_path.exists());
        assert_eq!(read_loans(&ledger_path).unwrap().len(), 1);
    }

    #[test]
    fn test_archive_empty_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("empty.jsonl");
        let csv_path = temp_dir.path().join("loans.csv");

        let count = ledger_to_csv_and_archive(&ledger_path, &csv_path).unwrap();
        assert_eq!(count, 0);
    }
}
