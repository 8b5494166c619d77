//! Core domain types for the Shelfmark catalog.
//!
//! This module defines the fundamental types used throughout the system:
//! - Bibliographic records and copies (physical and digital)
//! - The borrow/return availability state machine
//! - Members and their held copies
//! - Loan records for the circulation ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Bibliographic Types
// ============================================================================

/// Static bibliographic data for a catalogued title
///
/// The ISBN is the identity used everywhere else in the system; records are
/// not modified after catalog entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookRecord {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publication_year: i32,
}

impl BookRecord {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: impl Into<String>,
        publication_year: i32,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            publication_year,
        }
    }
}

// ============================================================================
// Copy Types
// ============================================================================

/// Circulation state of a physical copy
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Borrowed,
}

/// A borrowable physical copy on a shelf
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhysicalCopy {
    pub record: BookRecord,
    pub shelf_location: String,
    pub availability: Availability,
}

impl PhysicalCopy {
    /// Create a new copy; fresh copies start out available
    pub fn new(record: BookRecord, shelf_location: impl Into<String>) -> Self {
        Self {
            record,
            shelf_location: shelf_location.into(),
            availability: Availability::Available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }

    /// Check out this copy
    ///
    /// Available → Borrowed, returns true. Returns false with no state
    /// change if the copy is already borrowed.
    pub fn borrow(&mut self) -> bool {
        if self.availability == Availability::Available {
            self.availability = Availability::Borrowed;
            true
        } else {
            false
        }
    }

    /// Return this copy
    ///
    /// Borrowed → Available, returns true. Returns false with no state
    /// change if the copy is already available.
    pub fn return_copy(&mut self) -> bool {
        if self.availability == Availability::Borrowed {
            self.availability = Availability::Available;
            true
        } else {
            false
        }
    }
}

/// A digital copy; never exclusively held, so it carries no availability
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DigitalCopy {
    pub record: BookRecord,
    pub file_size_mb: f64,
    pub download_link: String,
}

impl DigitalCopy {
    pub fn new(
        record: BookRecord,
        file_size_mb: f64,
        download_link: impl Into<String>,
    ) -> Self {
        Self {
            record,
            file_size_mb,
            download_link: download_link.into(),
        }
    }

    /// One-line rendering for listings
    pub fn info(&self) -> String {
        format!(
            "{} by {}, ISBN: {}, File Size: {} MB",
            self.record.title, self.record.author, self.record.isbn, self.file_size_mb
        )
    }
}

/// A catalog entry: either copy kind, dispatched explicitly
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookEntry {
    Physical(PhysicalCopy),
    Digital(DigitalCopy),
}

impl BookEntry {
    pub fn record(&self) -> &BookRecord {
        match self {
            BookEntry::Physical(copy) => &copy.record,
            BookEntry::Digital(copy) => &copy.record,
        }
    }

    pub fn isbn(&self) -> &str {
        &self.record().isbn
    }

    /// Whether this entry can be checked out right now
    ///
    /// Digital copies are never borrowable through the circulation path.
    pub fn is_borrowable(&self) -> bool {
        match self {
            BookEntry::Physical(copy) => copy.is_available(),
            BookEntry::Digital(_) => false,
        }
    }

    pub fn as_physical(&self) -> Option<&PhysicalCopy> {
        match self {
            BookEntry::Physical(copy) => Some(copy),
            BookEntry::Digital(_) => None,
        }
    }

    pub fn as_physical_mut(&mut self) -> Option<&mut PhysicalCopy> {
        match self {
            BookEntry::Physical(copy) => Some(copy),
            BookEntry::Digital(_) => None,
        }
    }
}

// ============================================================================
// Member Types
// ============================================================================

/// A registered borrower
///
/// `borrowed` holds the ISBNs of currently held physical copies in the
/// order they were checked out. A copy appears in at most one member's
/// list at any time, and appears there iff the copy is marked Borrowed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub name: String,
    #[serde(default)]
    pub borrowed: Vec<String>,
}

impl Member {
    pub fn new(member_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            name: name.into(),
            borrowed: Vec::new(),
        }
    }

    pub fn holds(&self, isbn: &str) -> bool {
        self.borrowed.iter().any(|held| held == isbn)
    }

    /// Borrow a catalog entry
    ///
    /// Succeeds only for a physical copy that is currently available:
    /// the copy flips to Borrowed and its ISBN is appended to the held
    /// list. Any other entry leaves all state untouched and returns false.
    pub fn borrow_book(&mut self, entry: &mut BookEntry) -> bool {
        match entry {
            BookEntry::Physical(copy) => {
                if copy.borrow() {
                    self.borrowed.push(copy.record.isbn.clone());
                    true
                } else {
                    false
                }
            }
            BookEntry::Digital(_) => false,
        }
    }

    /// Return a catalog entry
    ///
    /// Succeeds only if this member currently holds the entry's ISBN: the
    /// ISBN is removed from the held list and the copy flips back to
    /// Available. Otherwise returns false with no mutation.
    pub fn return_book(&mut self, entry: &mut BookEntry) -> bool {
        let isbn = entry.isbn().to_string();
        match self.borrowed.iter().position(|held| *held == isbn) {
            Some(index) => {
                self.borrowed.remove(index);
                if let BookEntry::Physical(copy) = entry {
                    copy.return_copy();
                }
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Loan Types
// ============================================================================

/// One row in the circulation ledger
///
/// `returned_at` stays None while the copy is checked out.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: Uuid,
    pub isbn: String,
    pub member_id: String,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl LoanRecord {
    /// Open a new loan at the given instant
    pub fn open(
        isbn: impl Into<String>,
        member_id: impl Into<String>,
        borrowed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            isbn: isbn.into(),
            member_id: member_id.into(),
            borrowed_at,
            returned_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}
