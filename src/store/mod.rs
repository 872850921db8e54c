//! Reference-compressed sequence store.
//!
//! The store owns the reference (packed once at construction, never replaced)
//! and one [`Journal`] per haplotype. Haplotypes are only ever appended, so an
//! id handed out once stays valid for the lifetime of the store.

mod aligner;

pub use aligner::{
    AlignError, BandedAligner, EditAligner, DEFAULT_BAND_PADDING, DEFAULT_MAX_CELLS, GAP_EXTEND_COST,
    GAP_OPEN_COST, MISMATCH_COST,
};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::journal::{Edit, HaplotypeView, Journal, JournalError};
use crate::sequence::{PackedSequence, Symbol};

/// Dense 0-based haplotype identifier.
pub type HaplotypeId = usize;

/// Digest identifying one revision of a store's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreFingerprint(pub [u8; 32]);

impl fmt::Display for StoreFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Errors raised by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be built on an empty reference.
    #[error("reference sequence is empty")]
    EmptyReference,

    /// The edits for a new haplotype were rejected.
    #[error("haplotype {haplotype} rejected: {source}")]
    Journal {
        /// Id the haplotype would have received.
        haplotype: HaplotypeId,
        /// Underlying journal error.
        #[source]
        source: JournalError,
    },

    /// Edits could not be derived for a new haplotype.
    #[error("haplotype {haplotype} could not be aligned: {source}")]
    Alignment {
        /// Id the haplotype would have received.
        haplotype: HaplotypeId,
        /// Underlying aligner error.
        #[source]
        source: AlignError,
    },

    /// No haplotype with this id.
    #[error("unknown haplotype {id} (store holds {count})")]
    UnknownHaplotype {
        /// Requested id.
        id: HaplotypeId,
        /// Number of haplotypes in the store.
        count: usize,
    },
}

/// Reference plus one edit journal per haplotype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcsStore {
    reference: PackedSequence,
    journals: Vec<Journal>,
}

impl RcsStore {
    /// Create a store around `reference`.
    pub fn new(reference: &[Symbol]) -> Result<Self, StoreError> {
        if reference.is_empty() {
            return Err(StoreError::EmptyReference);
        }
        Ok(Self {
            reference: PackedSequence::from_symbols(reference),
            journals: Vec::new(),
        })
    }

    /// The shared reference.
    pub fn reference(&self) -> &PackedSequence {
        &self.reference
    }

    /// Length of the reference.
    pub fn reference_len(&self) -> usize {
        self.reference.len()
    }

    /// Number of haplotypes.
    pub fn haplotype_count(&self) -> usize {
        self.journals.len()
    }

    /// All journals in id order.
    pub fn journals(&self) -> &[Journal] {
        &self.journals
    }

    /// Journal of haplotype `id`.
    pub fn journal(&self, id: HaplotypeId) -> Option<&Journal> {
        self.journals.get(id)
    }

    /// Align `haplotype` with the default [`BandedAligner`] and append it.
    pub fn add_haplotype(&mut self, haplotype: &[Symbol]) -> Result<HaplotypeId, StoreError> {
        self.add_haplotype_with(haplotype, &BandedAligner::default())
    }

    /// Align `haplotype` with `aligner` and append it.
    pub fn add_haplotype_with<A: EditAligner + ?Sized>(
        &mut self,
        haplotype: &[Symbol],
        aligner: &A,
    ) -> Result<HaplotypeId, StoreError> {
        let reference = self.reference.to_vec();
        let edits = aligner
            .align(&reference, haplotype)
            .map_err(|source| StoreError::Alignment {
                haplotype: self.journals.len(),
                source,
            })?;
        self.add_journal(edits)
    }

    /// Append a haplotype given as pre-computed edits.
    ///
    /// On error the store is left untouched.
    pub fn add_journal(&mut self, edits: Vec<Edit>) -> Result<HaplotypeId, StoreError> {
        let id = self.journals.len();
        let journal = Journal::from_edits(self.reference.len(), edits)
            .map_err(|source| StoreError::Journal { haplotype: id, source })?;
        debug!(haplotype = id, edits = journal.len(), "added haplotype");
        self.journals.push(journal);
        Ok(id)
    }

    /// Lazy view of haplotype `id`.
    pub fn sequence_at(&self, id: HaplotypeId) -> Result<HaplotypeView<'_>, StoreError> {
        self.journals
            .get(id)
            .map(|journal| HaplotypeView::new(&self.reference, journal))
            .ok_or(StoreError::UnknownHaplotype {
                id,
                count: self.journals.len(),
            })
    }

    /// Re-check what construction guarantees: a well-formed reference and
    /// journals that rebuild to themselves. Used on decoded stores.
    pub(crate) fn check_layout(&self) -> Result<(), String> {
        if self.reference.is_empty() || !self.reference.is_well_formed() {
            return Err(String::from("malformed reference"));
        }
        for (id, journal) in self.journals.iter().enumerate() {
            if journal.reference_len() != self.reference.len() {
                return Err(format!(
                    "haplotype {id} targets reference length {}, store holds {}",
                    journal.reference_len(),
                    self.reference.len()
                ));
            }
            let rebuilt = Journal::from_edits(journal.reference_len(), journal.edits().iter().cloned())
                .map_err(|err| format!("haplotype {id}: {err}"))?;
            if rebuilt != *journal {
                return Err(format!("haplotype {id}: coordinate table disagrees with its edits"));
            }
        }
        Ok(())
    }

    /// Digest over the reference and every journal in id order.
    pub fn fingerprint(&self) -> StoreFingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.reference.len() as u64).to_le_bytes());
        let reference: Vec<u8> = self.reference.iter().map(|s| s.rank() as u8).collect();
        hasher.update(&reference);

        hasher.update(&(self.journals.len() as u64).to_le_bytes());
        for journal in &self.journals {
            hasher.update(&(journal.len() as u64).to_le_bytes());
            for edit in journal.edits() {
                hasher.update(&(edit.position as u64).to_le_bytes());
                hasher.update(&[edit.kind as u8]);
                hasher.update(&(edit.span as u64).to_le_bytes());
                hasher.update(&(edit.payload.len() as u64).to_le_bytes());
                let payload: Vec<u8> = edit.payload.iter().map(|s| s.rank() as u8).collect();
                hasher.update(&payload);
            }
        }
        StoreFingerprint(*hasher.finalize().as_bytes())
    }
}
