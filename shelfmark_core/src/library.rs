//! The Library aggregate: catalog entries and registered members.
//!
//! The aggregate only contains and filters; circulation decisions live in
//! the `circulation` module. `remove_book` deliberately does not detach a
//! removed copy from a member who still holds it — `validate` reports the
//! dangling hold instead.

use crate::types::{BookEntry, Member};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Aggregate root holding the catalog and the member roster
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Library {
    #[serde(default)]
    pub books: Vec<BookEntry>,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the catalog; uniqueness is up to the caller
    pub fn add_book(&mut self, entry: BookEntry) {
        tracing::debug!("Added book {} to catalog", entry.isbn());
        self.books.push(entry);
    }

    /// Remove the first entry with the given ISBN
    ///
    /// Returns false if no entry matches; nothing is raised.
    pub fn remove_book(&mut self, isbn: &str) -> bool {
        match self.books.iter().position(|entry| entry.isbn() == isbn) {
            Some(index) => {
                self.books.remove(index);
                tracing::debug!("Removed book {} from catalog", isbn);
                true
            }
            None => false,
        }
    }

    /// Register a member; no duplicate-id check
    pub fn register_member(&mut self, member: Member) {
        tracing::debug!("Registered member {}", member.member_id);
        self.members.push(member);
    }

    /// All physical copies currently available, in insertion order
    ///
    /// Digital entries are excluded. Pure read, recomputed on every call.
    pub fn available_books(&self) -> Vec<&BookEntry> {
        self.books
            .iter()
            .filter(|entry| entry.is_borrowable())
            .collect()
    }

    pub fn book(&self, isbn: &str) -> Option<&BookEntry> {
        self.books.iter().find(|entry| entry.isbn() == isbn)
    }

    pub fn book_mut(&mut self, isbn: &str) -> Option<&mut BookEntry> {
        self.books.iter_mut().find(|entry| entry.isbn() == isbn)
    }

    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.member_id == member_id)
    }

    pub fn member_mut(&mut self, member_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.member_id == member_id)
    }

    /// Borrow a member and a catalog entry mutably at the same time
    ///
    /// `books` and `members` are disjoint fields, so both borrows are safe.
    pub(crate) fn member_and_book_mut(
        &mut self,
        member_id: &str,
        isbn: &str,
    ) -> (Option<&mut Member>, Option<&mut BookEntry>) {
        let member = self.members.iter_mut().find(|m| m.member_id == member_id);
        let book = self.books.iter_mut().find(|entry| entry.isbn() == isbn);
        (member, book)
    }

    /// Validate the aggregate for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut seen_isbns = HashSet::new();
        for entry in &self.books {
            let isbn = entry.isbn();
            if isbn.is_empty() {
                errors.push("Catalog entry has empty ISBN".to_string());
            }
            if !seen_isbns.insert(isbn.to_string()) {
                errors.push(format!("Duplicate ISBN '{}' in catalog", isbn));
            }
            if entry.record().title.is_empty() {
                errors.push(format!("Book '{}' has empty title", isbn));
            }
        }

        let mut seen_member_ids = HashSet::new();
        let mut holders: Vec<(&str, &str)> = Vec::new();
        for member in &self.members {
            if member.member_id.is_empty() {
                errors.push("Member has empty id".to_string());
            }
            if !seen_member_ids.insert(member.member_id.clone()) {
                errors.push(format!("Duplicate member id '{}'", member.member_id));
            }

            for isbn in &member.borrowed {
                holders.push((isbn.as_str(), member.member_id.as_str()));

                match self.book(isbn) {
                    None => errors.push(format!(
                        "Member '{}' holds '{}' which is not in the catalog",
                        member.member_id, isbn
                    )),
                    Some(BookEntry::Digital(_)) => errors.push(format!(
                        "Member '{}' holds digital copy '{}'",
                        member.member_id, isbn
                    )),
                    Some(BookEntry::Physical(copy)) => {
                        if copy.is_available() {
                            errors.push(format!(
                                "Copy '{}' is held by member '{}' but marked available",
                                isbn, member.member_id
                            ));
                        }
                    }
                }
            }
        }

        // A copy may appear in at most one member's held list
        let mut held_isbns = HashSet::new();
        for (isbn, member_id) in &holders {
            if !held_isbns.insert(*isbn) {
                errors.push(format!(
                    "Copy '{}' is held by more than one member (including '{}')",
                    isbn, member_id
                ));
            }
        }

        // A borrowed copy must be held by someone
        for entry in &self.books {
            if let BookEntry::Physical(copy) = entry {
                if !copy.is_available() && !held_isbns.contains(copy.record.isbn.as_str()) {
                    errors.push(format!(
                        "Copy '{}' is marked borrowed but no member holds it",
                        copy.record.isbn
                    ));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Availability, BookRecord, DigitalCopy, PhysicalCopy};

    fn physical(isbn: &str, shelf: &str) -> BookEntry {
        BookEntry::Physical(PhysicalCopy::new(
            BookRecord::new("Sample Book", "Sample Author", isbn, 2022),
            shelf,
        ))
    }

    fn digital(isbn: &str) -> BookEntry {
        BookEntry::Digital(DigitalCopy::new(
            BookRecord::new("Sample Book", "Sample Author", isbn, 2022),
            1.5,
            "https://example.com/dl",
        ))
    }

    #[test]
    fn test_available_books_filters_and_preserves_order() {
        let mut library = Library::new();
        library.add_book(physical("1111", "A1"));
        library.add_book(digital("2222"));
        library.add_book(physical("3333", "B2"));

        if let Some(copy) = library.book_mut("3333").and_then(BookEntry::as_physical_mut) {
            copy.borrow();
        }

        let available: Vec<&str> = library
            .available_books()
            .iter()
            .map(|entry| entry.isbn())
            .collect();
        assert_eq!(available, vec!["1111"]);

        if let Some(copy) = library.book_mut("3333").and_then(BookEntry::as_physical_mut) {
            copy.return_copy();
        }

        let available: Vec<&str> = library
            .available_books()
            .iter()
            .map(|entry| entry.isbn())
            .collect();
        assert_eq!(available, vec!["1111", "3333"]);
    }

    #[test]
    fn test_remove_absent_book_returns_false() {
        let mut library = Library::new();
        library.add_book(physical("1111", "A1"));

        assert!(!library.remove_book("9999"));
        assert_eq!(library.books.len(), 1);
        assert!(library.remove_book("1111"));
        assert!(library.books.is_empty());
    }

    #[test]
    fn test_validate_empty_library() {
        let library = Library::new();
        assert!(library.validate().is_empty());
    }

    #[test]
    fn test_validate_catches_duplicate_isbn() {
        let mut library = Library::new();
        library.add_book(physical("1111", "A1"));
        library.add_book(physical("1111", "A2"));

        let errors = library.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Duplicate ISBN"));
    }

    #[test]
    fn test_validate_catches_hold_of_available_copy() {
        let mut library = Library::new();
        library.add_book(physical("1111", "A1"));
        let mut member = Member::new("m1", "First");
        member.borrowed.push("1111".into());
        library.register_member(member);

        let errors = library.validate();
        assert!(errors.iter().any(|e| e.contains("marked available")));
    }

    #[test]
    fn test_validate_catches_double_hold() {
        let mut library = Library::new();
        library.add_book(physical("1111", "A1"));
        if let Some(copy) = library.book_mut("1111").and_then(BookEntry::as_physical_mut) {
            copy.availability = Availability::Borrowed;
        }

        let mut first = Member::new("m1", "First");
        first.borrowed.push("1111".into());
        let mut second = Member::new("m2", "Second");
        second.borrowed.push("1111".into());
        library.register_member(first);
        library.register_member(second);

        let errors = library.validate();
        assert!(errors.iter().any(|e| e.contains("more than one member")));
    }

    #[test]
    fn test_validate_catches_dangling_hold_after_remove() {
        let mut library = Library::new();
        library.add_book(physical("1111", "A1"));
        let mut member = Member::new("m1", "First");

        let entry = library.book_mut("1111").unwrap();
        assert!(member.borrow_book(entry));
        library.register_member(member);

        assert!(library.remove_book("1111"));
        let errors = library.validate();
        assert!(errors.iter().any(|e| e.contains("not in the catalog")));
    }

    #[test]
    fn test_consistent_library_validates_clean() {
        let mut library = Library::new();
        library.add_book(physical("1111", "A1"));
        library.add_book(digital("2222"));
        let mut member = Member::new("m1", "First");

        let entry = library.book_mut("1111").unwrap();
        assert!(member.borrow_book(entry));
        library.register_member(member);

        assert!(library.validate().is_empty());
    }
}
