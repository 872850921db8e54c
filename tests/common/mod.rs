#![allow(dead_code)]

use jstmap::sequence::{encode, Symbol};
use jstmap::{build_store, RcsStore};
use proptest::prelude::*;

pub fn syms(s: &str) -> Vec<Symbol> {
    encode(s.as_bytes()).expect("test sequences use ACGTN")
}

pub fn dna(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')],
        len,
    )
}

/// `(kind, offset, base, length)`; offsets are reduced modulo the current length.
pub type Mutation = (u8, usize, u8, usize);

pub fn mutations(max: usize) -> impl Strategy<Value = Vec<Mutation>> {
    proptest::collection::vec(
        (0u8..3, any::<usize>(), prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 1usize..4),
        0..max,
    )
}

pub fn mutate(reference: &[u8], mutations: &[Mutation]) -> Vec<u8> {
    let mut sequence = reference.to_vec();
    for &(kind, offset, base, length) in mutations {
        match kind {
            0 if !sequence.is_empty() => {
                let pos = offset % sequence.len();
                sequence[pos] = base;
            }
            1 => {
                let pos = offset % (sequence.len() + 1);
                for _ in 0..length {
                    sequence.insert(pos, base);
                }
            }
            _ if sequence.len() > length => {
                let pos = offset % (sequence.len() - length + 1);
                sequence.drain(pos..pos + length);
            }
            _ => {}
        }
    }
    sequence
}

/// Reference plus haplotypes derived from it by a few random mutations.
pub fn haplotype_set() -> impl Strategy<Value = (Vec<u8>, Vec<Vec<u8>>)> {
    dna(12..40).prop_flat_map(|reference| {
        let haplotypes = proptest::collection::vec(mutations(4), 1..4);
        (Just(reference), haplotypes).prop_map(|(reference, edits)| {
            let haplotypes = edits.iter().map(|m| mutate(&reference, m)).collect();
            (reference, haplotypes)
        })
    })
}

pub fn store_of(reference: &[u8], haplotypes: &[Vec<u8>]) -> RcsStore {
    let (store, failures) = build_store(reference, haplotypes).expect("store builds");
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    store
}

/// Best semi-global distance of `pattern` ending after each haystack symbol.
pub fn naive_distances(pattern: &[Symbol], haystack: &[Symbol]) -> Vec<usize> {
    let m = pattern.len();
    let mut column: Vec<usize> = (0..=m).collect();
    let mut out = Vec::with_capacity(haystack.len());
    for &symbol in haystack {
        let mut next = vec![0; m + 1];
        for i in 1..=m {
            let diagonal = column[i - 1] + usize::from(pattern[i - 1] != symbol);
            next[i] = diagonal.min(column[i] + 1).min(next[i - 1] + 1);
        }
        out.push(next[m]);
        column = next;
    }
    out
}

/// Every `(haplotype, end, distance)` within `budget`, by brute force.
pub fn brute_force_hits(store: &RcsStore, pattern: &[Symbol], budget: usize) -> Vec<(usize, usize, usize)> {
    let mut hits = Vec::new();
    for h in 0..store.haplotype_count() {
        let sequence = store.sequence_at(h).expect("haplotype exists").to_vec();
        for (i, distance) in naive_distances(pattern, &sequence).into_iter().enumerate() {
            if distance <= budget {
                hits.push((h, i + 1, distance));
            }
        }
    }
    hits
}
