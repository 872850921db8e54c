//! Edit journals: one haplotype expressed as sorted edits against the reference.
//!
//! Edits are kept sorted strictly ascending by reference position and never
//! overlap. Next to the edits the journal caches the haplotype coordinate at
//! which each edit starts, so coordinate lookups are a binary search rather
//! than a replay.

mod view;

pub use view::{HaplotypeIter, HaplotypeView};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sequence::Symbol;

/// Kind of difference an [`Edit`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EditKind {
    /// Replace `span` reference symbols with the same number of payload symbols.
    Substitution,
    /// Insert the payload before the reference symbol at `position`.
    Insertion,
    /// Remove `span` reference symbols.
    Deletion,
}

/// One difference between a haplotype and the reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edit {
    /// Reference coordinate where the edit applies.
    pub position: usize,
    /// Edit kind.
    pub kind: EditKind,
    /// Symbols emitted by the haplotype in place of the affected range.
    pub payload: Vec<Symbol>,
    /// Number of reference symbols affected.
    pub span: usize,
}

impl Edit {
    /// Substitute `payload.len()` reference symbols starting at `position`.
    pub fn substitution(position: usize, payload: Vec<Symbol>) -> Self {
        let span = payload.len();
        Self {
            position,
            kind: EditKind::Substitution,
            payload,
            span,
        }
    }

    /// Insert `payload` before reference symbol `position`.
    pub fn insertion(position: usize, payload: Vec<Symbol>) -> Self {
        Self {
            position,
            kind: EditKind::Insertion,
            payload,
            span: 0,
        }
    }

    /// Delete `span` reference symbols starting at `position`.
    pub fn deletion(position: usize, span: usize) -> Self {
        Self {
            position,
            kind: EditKind::Deletion,
            payload: Vec::new(),
            span,
        }
    }

    /// End (exclusive) of the affected reference range.
    #[inline]
    pub fn end(&self) -> usize {
        self.position + self.span
    }

    /// Change in sequence length caused by this edit.
    #[inline]
    pub fn length_delta(&self) -> isize {
        self.payload.len() as isize - self.span as isize
    }

    fn check_shape(&self) -> Result<(), JournalError> {
        let reason = match self.kind {
            EditKind::Substitution if self.payload.is_empty() => Some("empty payload"),
            EditKind::Substitution if self.payload.len() != self.span => {
                Some("payload length differs from span")
            }
            EditKind::Insertion if self.payload.is_empty() => Some("empty payload"),
            EditKind::Insertion if self.span != 0 => Some("insertion with non-zero span"),
            EditKind::Deletion if self.span == 0 => Some("zero-length deletion"),
            EditKind::Deletion if !self.payload.is_empty() => Some("deletion with payload"),
            _ => None,
        };
        match reason {
            Some(reason) => Err(JournalError::InvalidEdit {
                position: self.position,
                kind: self.kind,
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Errors raised while building or reading a journal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    /// The edit's reference range intersects an existing edit.
    #[error("edit at {position} overlaps edit at {existing}")]
    Overlap {
        /// Position of the rejected edit.
        position: usize,
        /// Position of the edit it collides with.
        existing: usize,
    },

    /// Edits were supplied out of ascending position order.
    #[error("edit at {position} does not follow previous edit at {previous}")]
    Order {
        /// Position of the rejected edit.
        position: usize,
        /// Position of the last accepted edit.
        previous: usize,
    },

    /// Payload and span do not agree with the edit kind.
    #[error("malformed {kind:?} at {position}: {reason}")]
    InvalidEdit {
        /// Position of the rejected edit.
        position: usize,
        /// Kind of the rejected edit.
        kind: EditKind,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The affected range runs past the end of the reference.
    #[error("edit range [{start}, {end}) exceeds reference length {reference_len}")]
    BeyondReference {
        /// Start of the affected range.
        start: usize,
        /// End of the affected range.
        end: usize,
        /// Reference length.
        reference_len: usize,
    },

    /// Coordinate access past the end of a sequence.
    #[error("coordinate {position} out of range for length {length}")]
    OutOfRange {
        /// Requested coordinate.
        position: usize,
        /// Length of the sequence.
        length: usize,
    },
}

impl JournalError {
    /// Whether the error rejects malformed edit input (as opposed to a bad lookup).
    pub fn is_construction_error(&self) -> bool {
        !matches!(self, JournalError::OutOfRange { .. })
    }
}

/// Where a haplotype coordinate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locus {
    /// Copied from the reference at this coordinate.
    Reference(usize),
    /// Payload symbol `offset` of the edit with index `edit`.
    Payload {
        /// Index of the edit within the journal.
        edit: usize,
        /// Offset within the edit payload.
        offset: usize,
    },
}

/// Sorted, non-overlapping edits for one haplotype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    reference_len: usize,
    edits: Vec<Edit>,
    /// Haplotype coordinate where each edit's payload starts.
    starts: Vec<usize>,
}

impl Journal {
    /// Empty journal (haplotype identical to the reference).
    pub fn new(reference_len: usize) -> Self {
        Self {
            reference_len,
            edits: Vec::new(),
            starts: Vec::new(),
        }
    }

    /// Build a journal from edits that must already be sorted.
    pub fn from_edits(
        reference_len: usize,
        edits: impl IntoIterator<Item = Edit>,
    ) -> Result<Self, JournalError> {
        let mut journal = Self::new(reference_len);
        for edit in edits {
            journal.push(edit)?;
        }
        Ok(journal)
    }

    /// Append an edit that starts after every existing edit.
    pub fn push(&mut self, edit: Edit) -> Result<(), JournalError> {
        self.check_bounds(&edit)?;
        if let Some(last) = self.edits.last() {
            if edit.position <= last.position {
                return Err(JournalError::Order {
                    position: edit.position,
                    previous: last.position,
                });
            }
            if last.end() > edit.position {
                return Err(JournalError::Overlap {
                    position: edit.position,
                    existing: last.position,
                });
            }
        }

        let start = match (self.edits.last(), self.starts.last()) {
            (Some(last), Some(&last_start)) => {
                last_start + last.payload.len() + (edit.position - last.end())
            }
            _ => edit.position,
        };
        self.edits.push(edit);
        self.starts.push(start);
        Ok(())
    }

    /// Insert an edit at its sorted position.
    pub fn insert(&mut self, edit: Edit) -> Result<(), JournalError> {
        self.check_bounds(&edit)?;
        let idx = self.edits.partition_point(|e| e.position < edit.position);

        if let Some(next) = self.edits.get(idx) {
            if next.position == edit.position || edit.end() > next.position {
                return Err(JournalError::Overlap {
                    position: edit.position,
                    existing: next.position,
                });
            }
        }
        if idx > 0 {
            let prev = &self.edits[idx - 1];
            if prev.end() > edit.position {
                return Err(JournalError::Overlap {
                    position: edit.position,
                    existing: prev.position,
                });
            }
        }

        self.edits.insert(idx, edit);
        self.starts.insert(idx, 0);
        self.recompute_starts(idx);
        Ok(())
    }

    fn check_bounds(&self, edit: &Edit) -> Result<(), JournalError> {
        edit.check_shape()?;
        if edit.end() > self.reference_len || edit.position > self.reference_len {
            return Err(JournalError::BeyondReference {
                start: edit.position,
                end: edit.end(),
                reference_len: self.reference_len,
            });
        }
        Ok(())
    }

    fn recompute_starts(&mut self, from: usize) {
        for idx in from..self.edits.len() {
            self.starts[idx] = if idx == 0 {
                self.edits[0].position
            } else {
                let prev = &self.edits[idx - 1];
                self.starts[idx - 1] + prev.payload.len() + (self.edits[idx].position - prev.end())
            };
        }
    }

    /// Length of the reference this journal applies to.
    pub fn reference_len(&self) -> usize {
        self.reference_len
    }

    /// Sorted edits.
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Number of edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Whether the haplotype equals the reference.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Length of the reconstructed haplotype.
    pub fn haplotype_len(&self) -> usize {
        let delta: isize = self.edits.iter().map(Edit::length_delta).sum();
        (self.reference_len as isize + delta) as usize
    }

    /// Haplotype coordinate at which edit `idx` starts emitting its payload.
    pub fn edit_start(&self, idx: usize) -> Option<usize> {
        self.starts.get(idx).copied()
    }

    /// Edit starting exactly at reference `position`.
    pub fn edit_at(&self, position: usize) -> Option<(usize, &Edit)> {
        let idx = self.edits.partition_point(|e| e.position < position);
        self.edits
            .get(idx)
            .filter(|edit| edit.position == position)
            .map(|edit| (idx, edit))
    }

    /// Last edit starting at or before reference `position`.
    pub fn last_at_or_before(&self, position: usize) -> Option<&Edit> {
        let idx = self.edits.partition_point(|e| e.position <= position);
        idx.checked_sub(1).map(|i| &self.edits[i])
    }

    /// First edit starting at or after reference `position`.
    pub fn first_at_or_after(&self, position: usize) -> Option<&Edit> {
        let idx = self.edits.partition_point(|e| e.position < position);
        self.edits.get(idx)
    }

    /// End of the last edit that starts strictly before `position`.
    pub fn previous_end(&self, position: usize) -> Option<usize> {
        let idx = self.edits.partition_point(|e| e.position < position);
        idx.checked_sub(1).map(|i| self.edits[i].end())
    }

    /// Resolve a haplotype coordinate to its source.
    pub fn locate(&self, coordinate: usize) -> Result<Locus, JournalError> {
        let length = self.haplotype_len();
        if coordinate >= length {
            return Err(JournalError::OutOfRange {
                position: coordinate,
                length,
            });
        }

        let idx = self.starts.partition_point(|&start| start <= coordinate);
        if idx == 0 {
            return Ok(Locus::Reference(coordinate));
        }
        let edit_idx = idx - 1;
        let edit = &self.edits[edit_idx];
        let offset = coordinate - self.starts[edit_idx];
        if offset < edit.payload.len() {
            Ok(Locus::Payload {
                edit: edit_idx,
                offset,
            })
        } else {
            Ok(Locus::Reference(edit.end() + offset - edit.payload.len()))
        }
    }

    /// Haplotype coordinate of reference symbol `position`, if the haplotype keeps it.
    pub fn haplotype_coordinate(&self, position: usize) -> Option<usize> {
        let idx = self.edits.partition_point(|e| e.position <= position);
        if idx == 0 {
            return Some(position);
        }
        let edit = &self.edits[idx - 1];
        if edit.span > 0 && position < edit.end() {
            return None;
        }
        Some(self.starts[idx - 1] + edit.payload.len() + (position - edit.end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::encode;

    fn syms(s: &str) -> Vec<Symbol> {
        encode(s.as_bytes()).unwrap()
    }

    #[test]
    fn push_rejects_out_of_order_edits() {
        let mut journal = Journal::new(20);
        journal.push(Edit::substitution(5, syms("A"))).unwrap();
        let err = journal.push(Edit::substitution(3, syms("C"))).unwrap_err();
        assert_eq!(err, JournalError::Order { position: 3, previous: 5 });
        let err = journal.push(Edit::insertion(5, syms("C"))).unwrap_err();
        assert!(matches!(err, JournalError::Order { .. }));
    }

    #[test]
    fn insert_sorts_and_detects_overlap() {
        let mut journal = Journal::new(20);
        journal.insert(Edit::deletion(10, 3)).unwrap();
        journal.insert(Edit::substitution(2, syms("GG"))).unwrap();
        journal.insert(Edit::insertion(13, syms("T"))).unwrap();
        let positions: Vec<usize> = journal.edits().iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![2, 10, 13]);

        let err = journal.insert(Edit::substitution(11, syms("A"))).unwrap_err();
        assert_eq!(err, JournalError::Overlap { position: 11, existing: 10 });
        let err = journal.insert(Edit::substitution(3, syms("A"))).unwrap_err();
        assert_eq!(err, JournalError::Overlap { position: 3, existing: 2 });
        assert!(err.is_construction_error());
    }

    #[test]
    fn malformed_edits_are_rejected() {
        let mut journal = Journal::new(10);
        assert!(matches!(
            journal.push(Edit::deletion(1, 0)),
            Err(JournalError::InvalidEdit { .. })
        ));
        assert!(matches!(
            journal.push(Edit::insertion(1, Vec::new())),
            Err(JournalError::InvalidEdit { .. })
        ));
        assert!(matches!(
            journal.push(Edit::deletion(8, 3)),
            Err(JournalError::BeyondReference { .. })
        ));
        journal.push(Edit::insertion(10, syms("AC"))).unwrap();
        assert_eq!(journal.haplotype_len(), 12);
    }

    #[test]
    fn coordinates_follow_edits() {
        // reference: 0123456789, haplotype: 01 XY 2 3 [del 4,5] 6 7 Z 8 9 -> len 11
        let journal = Journal::from_edits(
            10,
            vec![
                Edit::insertion(2, syms("AC")),
                Edit::deletion(4, 2),
                Edit::insertion(8, syms("G")),
            ],
        )
        .unwrap();
        assert_eq!(journal.haplotype_len(), 11);
        assert_eq!(journal.haplotype_coordinate(1), Some(1));
        assert_eq!(journal.haplotype_coordinate(2), Some(4));
        assert_eq!(journal.haplotype_coordinate(4), None);
        assert_eq!(journal.haplotype_coordinate(6), Some(6));
        assert_eq!(journal.haplotype_coordinate(8), Some(9));
        assert_eq!(journal.locate(2).unwrap(), Locus::Payload { edit: 0, offset: 0 });
        assert_eq!(journal.locate(6).unwrap(), Locus::Reference(6));
        assert_eq!(journal.locate(8).unwrap(), Locus::Payload { edit: 2, offset: 0 });
        assert_eq!(journal.locate(10).unwrap(), Locus::Reference(9));
        assert!(matches!(
            journal.locate(11),
            Err(JournalError::OutOfRange { position: 11, length: 11 })
        ));
    }

    #[test]
    fn neighbour_lookups() {
        let journal =
            Journal::from_edits(20, vec![Edit::deletion(3, 2), Edit::substitution(9, syms("T"))])
                .unwrap();
        assert_eq!(journal.edit_at(9).map(|(i, _)| i), Some(1));
        assert!(journal.edit_at(4).is_none());
        assert_eq!(journal.last_at_or_before(8).map(|e| e.position), Some(3));
        assert_eq!(journal.first_at_or_after(4).map(|e| e.position), Some(9));
        assert_eq!(journal.previous_end(9), Some(5));
        assert_eq!(journal.previous_end(3), None);
    }
}
