use bitvec::prelude::*;

use crate::store::HaplotypeId;

/// Subset of haplotypes, one bit per haplotype id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    bits: BitVec,
}

impl Coverage {
    /// Empty subset over `haplotypes` ids.
    pub fn empty(haplotypes: usize) -> Self {
        Self {
            bits: bitvec![0; haplotypes],
        }
    }

    /// Subset containing every id below `haplotypes`.
    pub fn full(haplotypes: usize) -> Self {
        Self {
            bits: bitvec![1; haplotypes],
        }
    }

    /// Subset of `haplotypes` ids containing `ids`.
    pub fn from_ids(haplotypes: usize, ids: impl IntoIterator<Item = HaplotypeId>) -> Self {
        let mut coverage = Self::empty(haplotypes);
        for id in ids {
            coverage.insert(id);
        }
        coverage
    }

    /// Number of ids the subset ranges over.
    pub fn universe(&self) -> usize {
        self.bits.len()
    }

    /// Add `id`. Ids beyond the universe are ignored.
    pub fn insert(&mut self, id: HaplotypeId) {
        if id < self.bits.len() {
            self.bits.set(id, true);
        }
    }

    /// Remove `id`.
    pub fn remove(&mut self, id: HaplotypeId) {
        if id < self.bits.len() {
            self.bits.set(id, false);
        }
    }

    /// Whether `id` is in the subset.
    pub fn contains(&self, id: HaplotypeId) -> bool {
        self.bits.get(id).map(|bit| *bit).unwrap_or(false)
    }

    /// Number of ids in the subset.
    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Whether no id is in the subset.
    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// Ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = HaplotypeId> + '_ {
        self.bits.iter_ones()
    }

    /// Keep only ids for which `keep` holds.
    pub fn retain(&mut self, mut keep: impl FnMut(HaplotypeId) -> bool) {
        let ids: Vec<HaplotypeId> = self.bits.iter_ones().collect();
        for id in ids {
            if !keep(id) {
                self.bits.set(id, false);
            }
        }
    }

    /// Ids in `self` but not in `other`.
    pub fn difference(&self, other: &Coverage) -> Coverage {
        let mut result = self.clone();
        for id in other.iter() {
            result.remove(id);
        }
        result
    }
}
