//! Circulation ledger: one JSONL row per loan, with file locking.
//!
//! The ledger is an append/update log, not a derived view: a row is
//! appended at checkout with `returned_at` unset, and updated in place
//! (via atomic rewrite) when the copy comes back.

use crate::{LoanRecord, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Loan sink trait for persisting loan rows
pub trait LoanSink {
    fn append(&mut self, loan: &LoanRecord) -> Result<()>;
}

/// JSONL-based loan ledger with file locking
pub struct JsonlLedger {
    path: PathBuf,
}

impl JsonlLedger {
    /// Create a new ledger handle for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Stamp `returned_at` on the open loan matching the copy and member
    ///
    /// Rewrites the ledger atomically (temp file + rename). Returns false
    /// if no matching open loan exists; the file is left untouched.
    pub fn close(
        &mut self,
        isbn: &str,
        member_id: &str,
        returned_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut loans = read_loans(&self.path)?;

        let open = loans
            .iter_mut()
            .find(|loan| loan.is_open() && loan.isbn == isbn && loan.member_id == member_id);

        let loan = match open {
            Some(loan) => loan,
            None => return Ok(false),
        };
        loan.returned_at = Some(returned_at);
        let loan_id = loan.id;

        rewrite_loans(&self.path, &loans)?;
        tracing::debug!("Closed loan {} in ledger", loan_id);
        Ok(true)
    }
}

impl LoanSink for JsonlLedger {
    fn append(&mut self, loan: &LoanRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        // Open file for appending
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        // Write loan as JSON line
        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(loan)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended loan {} to ledger", loan.id);
        Ok(())
    }
}

/// Read all loans from a ledger file
pub fn read_loans(path: &Path) -> Result<Vec<LoanRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut loans = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<LoanRecord>(&line) {
            Ok(loan) => loans.push(loan),
            Err(e) => {
                tracing::warn!("Failed to parse loan at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} loans from ledger", loans.len());
    Ok(loans)
}

/// Atomically replace the ledger contents with the given loans
pub(crate) fn rewrite_loans(path: &Path, loans: &[LoanRecord]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "ledger path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        for loan in loans {
            let line = serde_json::to_string(loan)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;
    temp.persist(path).map_err(|e| crate::Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_loan(isbn: &str, member_id: &str) -> LoanRecord {
        LoanRecord::open(isbn, member_id, Utc::now())
    }

    #[test]
    fn test_append_and_read_single_loan() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("loans.jsonl");

        let loan = create_test_loan("1111", "m1");
        let loan_id = loan.id;

        let mut ledger = JsonlLedger::new(&ledger_path);
        ledger.append(&loan).unwrap();

        let loans = read_loans(&ledger_path).unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].id, loan_id);
        assert!(loans[0].is_open());
    }

    #[test]
    fn test_append_multiple_loans() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("loans.jsonl");

        let mut ledger = JsonlLedger::new(&ledger_path);
        for i in 0..5 {
            ledger
                .append(&create_test_loan(&format!("{}", i), "m1"))
                .unwrap();
        }

        let loans = read_loans(&ledger_path).unwrap();
        assert_eq!(loans.len(), 5);
    }

    #[test]
    fn test_read_empty_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("nonexistent.jsonl");

        let loans = read_loans(&ledger_path).unwrap();
        assert!(loans.is_empty());
    }

    #[test]
    fn test_close_stamps_return_date() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("loans.jsonl");

        let mut ledger = JsonlLedger::new(&ledger_path);
        ledger.append(&create_test_loan("1111", "m1")).unwrap();
        ledger.append(&create_test_loan("2222", "m1")).unwrap();

        assert!(ledger.close("1111", "m1", Utc::now()).unwrap());

        let loans = read_loans(&ledger_path).unwrap();
        assert_eq!(loans.len(), 2);
        let closed = loans.iter().find(|l| l.isbn == "1111").unwrap();
        assert!(!closed.is_open());
        let still_open = loans.iter().find(|l| l.isbn == "2222").unwrap();
        assert!(still_open.is_open());
    }

    #[test]
    fn test_close_without_matching_open_loan() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("loans.jsonl");

        let mut ledger = JsonlLedger::new(&ledger_path);
        ledger.append(&create_test_loan("1111", "m1")).unwrap();

        // Wrong member
        assert!(!ledger.close("1111", "m2", Utc::now()).unwrap());
        // Already closed
        assert!(ledger.close("1111", "m1", Utc::now()).unwrap());
        assert!(!ledger.close("1111", "m1", Utc::now()).unwrap());
    }

    #[test]
    fn test_close_picks_open_loan_among_closed_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ledger_path = temp_dir.path().join("loans.jsonl");

        let mut ledger = JsonlLedger::new(&ledger_path);
        let mut old = create_test_loan("1111", "m1");
        old.returned_at = Some(Utc::now());
        ledger.append(&old).unwrap();
        ledger.append(&create_test_loan("1111", "m1")).unwrap();

        assert!(ledger.close("1111", "m1", Utc::now()).unwrap());

        let loans = read_loans(&ledger_path).unwrap();
        assert!(loans.iter().all(|l| !l.is_open()));
    }
}
