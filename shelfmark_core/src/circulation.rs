//! Circulation engine: checkout and checkin against the catalog and ledger.
//!
//! The availability flag, the member's held list and the ledger row move
//! together behind one call. Preconditions are checked first, the ledger
//! is written second, and the in-memory mutation (infallible once the
//! preconditions hold) happens last — an I/O error leaves no partial
//! state. The domain verdict is the returned bool; `Err` carries only
//! infrastructure failures.

use crate::ledger::{JsonlLedger, LoanSink};
use crate::{BookEntry, Library, LoanRecord, Result};
use chrono::{DateTime, Utc};

/// Check a copy out to a member
///
/// Returns Ok(false) when the member or copy is unknown, the copy is
/// digital, or the copy is already borrowed.
pub fn check_out(
    library: &mut Library,
    ledger: &mut JsonlLedger,
    member_id: &str,
    isbn: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let (member, entry) = library.member_and_book_mut(member_id, isbn);

    let (member, entry) = match (member, entry) {
        (Some(member), Some(entry)) => (member, entry),
        _ => {
            tracing::info!("Checkout denied: unknown member '{}' or copy '{}'", member_id, isbn);
            return Ok(false);
        }
    };

    if !entry.is_borrowable() {
        tracing::info!("Checkout denied: copy '{}' is not borrowable", isbn);
        return Ok(false);
    }

    // Ledger first: if the append fails, no state has changed yet
    ledger.append(&LoanRecord::open(isbn, member_id, now))?;

    let borrowed = member.borrow_book(entry);
    debug_assert!(borrowed, "borrow must succeed after the precondition check");

    tracing::info!("Checked out '{}' to member '{}'", isbn, member_id);
    Ok(true)
}

/// Check a copy back in from a member
///
/// Returns Ok(false) when the member is unknown or does not currently
/// hold the copy.
pub fn check_in(
    library: &mut Library,
    ledger: &mut JsonlLedger,
    member_id: &str,
    isbn: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let (member, entry) = library.member_and_book_mut(member_id, isbn);

    let member = match member {
        Some(member) => member,
        None => {
            tracing::info!("Checkin denied: unknown member '{}'", member_id);
            return Ok(false);
        }
    };

    if !member.holds(isbn) {
        tracing::info!(
            "Checkin denied: member '{}' does not hold copy '{}'",
            member_id,
            isbn
        );
        return Ok(false);
    }

    // Close the ledger row before touching in-memory state. The row may
    // be missing when the ledger was started after the loan; the member's
    // held list stays authoritative for the verdict.
    if !ledger.close(isbn, member_id, now)? {
        tracing::warn!(
            "No open ledger row for copy '{}' and member '{}'",
            isbn,
            member_id
        );
    }

    if let Some(index) = member.borrowed.iter().position(|held| held == isbn) {
        member.borrowed.remove(index);
    }

    if let Some(copy) = entry.and_then(BookEntry::as_physical_mut) {
        copy.return_copy();
    }

    tracing::info!("Checked in '{}' from member '{}'", isbn, member_id);
    Ok(true)
}
