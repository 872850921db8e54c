//! Node descriptors of the sequence tree view.
//!
//! A node is a small value computed on demand from the store: a reference
//! interval (or an allele payload), the haplotypes carrying it, and where it
//! sits relative to the reference path. Nothing links nodes to each other;
//! children are recomputed from `(position, subset)` whenever they are asked
//! for.

use std::fmt;
use std::ops::Range;

use crate::journal::{Edit, EditKind};
use crate::sequence::Symbol;

use super::Coverage;

/// Alternative allele at a fork: what replaces the reference there.
///
/// Ordering is `(kind, span, payload)` and decides child order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AltAllele {
    /// Edit kind.
    pub kind: EditKind,
    /// Reference symbols replaced.
    pub span: usize,
    /// Symbols emitted instead.
    pub payload: Vec<Symbol>,
}

impl From<&Edit> for AltAllele {
    fn from(edit: &Edit) -> Self {
        Self {
            kind: edit.kind,
            span: edit.span,
            payload: edit.payload.clone(),
        }
    }
}

/// Label of the edge leading into a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Allele {
    /// The node continues along the reference.
    Reference,
    /// The node emits an alternative allele.
    Alternate(AltAllele),
}

/// Position of a node relative to the reference path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lineage {
    /// Terminal node.
    Nil,
    /// On the reference path.
    Base,
    /// Inside a branch that left the reference path at `root`.
    Branch {
        /// Base breakpoint where the branch forked.
        root: usize,
        /// Symbols emitted on the branch before this node.
        chain: usize,
        /// Reference symbols the branch may still follow after this node.
        budget: usize,
    },
}

/// One node of the sequence tree view.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) label: Allele,
    pub(crate) extent: Range<usize>,
    pub(crate) subset: Coverage,
    pub(crate) lineage: Lineage,
}

impl Node {
    /// The terminal node.
    pub fn nil() -> Self {
        Self {
            label: Allele::Reference,
            extent: 0..0,
            subset: Coverage::default(),
            lineage: Lineage::Nil,
        }
    }

    pub(crate) fn base(extent: Range<usize>, subset: Coverage) -> Self {
        Self {
            label: Allele::Reference,
            extent,
            subset,
            lineage: Lineage::Base,
        }
    }

    /// Whether this node marks the end of traversal.
    pub fn is_nil(&self) -> bool {
        self.lineage == Lineage::Nil
    }

    /// Whether the node lies on the reference path.
    pub fn is_base(&self) -> bool {
        self.lineage == Lineage::Base
    }

    /// Label of the edge into this node.
    pub fn label(&self) -> &Allele {
        &self.label
    }

    /// Reference interval covered before the node branches.
    ///
    /// For an alternative allele this is the reference range the allele
    /// replaces (empty for insertions).
    pub fn extent(&self) -> Range<usize> {
        self.extent.clone()
    }

    /// Haplotypes taking this node.
    pub fn subset(&self) -> &Coverage {
        &self.subset
    }

    /// Base breakpoint a branch node descends from.
    pub fn fork_root(&self) -> Option<usize> {
        match self.lineage {
            Lineage::Branch { root, .. } => Some(root),
            _ => None,
        }
    }

    /// Number of symbols the node emits.
    pub fn emitted_len(&self) -> usize {
        match &self.label {
            Allele::Alternate(allele) => allele.payload.len(),
            Allele::Reference => self.extent.len(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_nil(), other.is_nil()) {
            (true, true) => true,
            (false, false) => {
                self.label == other.label
                    && self.extent == other.extent
                    && self.subset == other.subset
                    && self.lineage == other.lineage
            }
            _ => false,
        }
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            return write!(f, "nil");
        }
        match &self.label {
            Allele::Reference => write!(f, "ref[{}, {})", self.extent.start, self.extent.end)?,
            Allele::Alternate(allele) => write!(
                f,
                "{:?}@{}+{}",
                allele.kind, self.extent.start, allele.payload.len()
            )?,
        }
        write!(f, " x{}", self.subset.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_equals_only_nil() {
        let mut other_nil = Node::nil();
        other_nil.extent = 4..9;
        assert_eq!(Node::nil(), other_nil);
        assert!(Node::nil().is_nil());

        let base = Node::base(0..3, Coverage::full(2));
        assert_ne!(base, Node::nil());
        assert_eq!(base.emitted_len(), 3);
        assert_eq!(base.to_string(), "ref[0, 3) x2");
    }

    #[test]
    fn alleles_order_by_kind_span_payload() {
        let sub = Allele::Alternate(AltAllele {
            kind: EditKind::Substitution,
            span: 1,
            payload: vec![Symbol::G],
        });
        let del = Allele::Alternate(AltAllele {
            kind: EditKind::Deletion,
            span: 1,
            payload: Vec::new(),
        });
        let mut labels = vec![del.clone(), Allele::Reference, sub.clone()];
        labels.sort();
        assert_eq!(labels, vec![Allele::Reference, sub, del]);
    }
}
