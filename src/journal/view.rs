use crate::sequence::{PackedSequence, Symbol};

use super::{Journal, JournalError, Locus};

/// Lazy view of one haplotype: reference plus journal, nothing materialised.
#[derive(Debug, Clone, Copy)]
pub struct HaplotypeView<'a> {
    reference: &'a PackedSequence,
    journal: &'a Journal,
}

impl<'a> HaplotypeView<'a> {
    /// Combine a reference with a journal recorded against it.
    pub fn new(reference: &'a PackedSequence, journal: &'a Journal) -> Self {
        Self { reference, journal }
    }

    /// Length of the haplotype.
    pub fn len(&self) -> usize {
        self.journal.haplotype_len()
    }

    /// Whether the haplotype is empty (e.g. everything deleted).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The journal backing this view.
    pub fn journal(&self) -> &'a Journal {
        self.journal
    }

    /// Symbol at haplotype coordinate `coordinate`.
    pub fn at(&self, coordinate: usize) -> Result<Symbol, JournalError> {
        let locus = self.journal.locate(coordinate)?;
        self.symbol_at(locus).ok_or(JournalError::OutOfRange {
            position: coordinate,
            length: self.len(),
        })
    }

    fn symbol_at(&self, locus: Locus) -> Option<Symbol> {
        match locus {
            Locus::Reference(position) => self.reference.get(position),
            Locus::Payload { edit, offset } => self
                .journal
                .edits()
                .get(edit)
                .and_then(|e| e.payload.get(offset).copied()),
        }
    }

    /// Forward iterator over the whole haplotype.
    pub fn iter(&self) -> HaplotypeIter<'a> {
        HaplotypeIter {
            reference: self.reference,
            journal: self.journal,
            edit_idx: 0,
            ref_pos: 0,
            payload_offset: 0,
        }
    }

    /// Forward iterator starting at haplotype coordinate `coordinate`.
    pub fn iter_from(&self, coordinate: usize) -> Result<HaplotypeIter<'a>, JournalError> {
        if coordinate == self.len() {
            return Ok(HaplotypeIter {
                reference: self.reference,
                journal: self.journal,
                edit_idx: self.journal.len(),
                ref_pos: self.reference.len(),
                payload_offset: 0,
            });
        }
        let iter = match self.journal.locate(coordinate)? {
            Locus::Reference(position) => HaplotypeIter {
                reference: self.reference,
                journal: self.journal,
                edit_idx: self
                    .journal
                    .edits()
                    .partition_point(|e| e.position <= position),
                ref_pos: position,
                payload_offset: 0,
            },
            Locus::Payload { edit, offset } => HaplotypeIter {
                reference: self.reference,
                journal: self.journal,
                edit_idx: edit,
                ref_pos: self.journal.edits()[edit].position,
                payload_offset: offset,
            },
        };
        Ok(iter)
    }

    /// Materialise `[start, start + len)`, clamped to the haplotype end.
    pub fn window(&self, start: usize, len: usize) -> Result<Vec<Symbol>, JournalError> {
        Ok(self.iter_from(start)?.take(len).collect())
    }

    /// Materialise the full haplotype.
    pub fn to_vec(&self) -> Vec<Symbol> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for HaplotypeView<'a> {
    type Item = Symbol;
    type IntoIter = HaplotypeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Single forward merge of reference and edits.
#[derive(Debug, Clone)]
pub struct HaplotypeIter<'a> {
    reference: &'a PackedSequence,
    journal: &'a Journal,
    edit_idx: usize,
    ref_pos: usize,
    payload_offset: usize,
}

impl Iterator for HaplotypeIter<'_> {
    type Item = Symbol;

    fn next(&mut self) -> Option<Symbol> {
        loop {
            if let Some(edit) = self.journal.edits().get(self.edit_idx) {
                if self.ref_pos == edit.position {
                    if let Some(&symbol) = edit.payload.get(self.payload_offset) {
                        self.payload_offset += 1;
                        return Some(symbol);
                    }
                    self.ref_pos = edit.end();
                    self.edit_idx += 1;
                    self.payload_offset = 0;
                    continue;
                }
            }
            let symbol = self.reference.get(self.ref_pos)?;
            self.ref_pos += 1;
            return Some(symbol);
        }
    }
}
