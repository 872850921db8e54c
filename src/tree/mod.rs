//! Sequence tree view over an [`RcsStore`].
//!
//! The view is implicit: nothing is stored besides the sorted breakpoints and
//! an index of edit starts. Nodes are intervals computed on demand.
//!
//! The reference path is cut at every edit start and end into base runs; each
//! run is shared by all haplotypes that are plain reference over it. At a
//! base breakpoint the alternative alleles starting there fork off. A branch
//! follows its haplotypes for at most `context - 1` reference symbols past
//! the allele (forking again on member edits) and then ends, because from
//! there on every window of `context` symbols lies on the reference path
//! again.

mod coverage;
mod node;
mod traversal;

pub use coverage::Coverage;
pub use node::{AltAllele, Allele, Node};
pub use traversal::{Origin, PathVisitor, Step};

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::store::{HaplotypeId, RcsStore};

use node::Lineage;

/// Errors raised by the tree view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A context length of zero symbols.
    #[error("context length must be at least 1")]
    ZeroContext,

    /// A traversal range outside the reference or empty.
    #[error("invalid range [{start}, {end}) for reference length {length}")]
    InvalidRange {
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
        /// Reference length.
        length: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct BranchCursor {
    budget: usize,
    root: usize,
    chain: usize,
    after_insertion: bool,
}

/// Store-wide positions the view is cut at; independent of the context.
#[derive(Debug)]
struct Layout {
    /// Every edit start and end plus `0` and the reference length.
    breakpoints: Vec<usize>,
    /// `(position, haplotype, edit index)` sorted by position.
    edit_starts: Vec<(usize, HaplotypeId, usize)>,
}

/// Lazily evaluated branching view of a store.
#[derive(Debug, Clone)]
pub struct SequenceTree<'s> {
    store: &'s RcsStore,
    context: usize,
    layout: Arc<Layout>,
}

impl<'s> SequenceTree<'s> {
    /// View `store` with windows of `context` symbols.
    pub fn new(store: &'s RcsStore, context: usize) -> Result<Self, TreeError> {
        if context == 0 {
            return Err(TreeError::ZeroContext);
        }

        let mut breakpoints = vec![0, store.reference_len()];
        let mut edit_starts = Vec::new();
        for (haplotype, journal) in store.journals().iter().enumerate() {
            for (idx, edit) in journal.edits().iter().enumerate() {
                breakpoints.push(edit.position);
                breakpoints.push(edit.end());
                edit_starts.push((edit.position, haplotype, idx));
            }
        }
        breakpoints.sort_unstable();
        breakpoints.dedup();
        edit_starts.sort_unstable();

        Ok(Self {
            store,
            context,
            layout: Arc::new(Layout {
                breakpoints,
                edit_starts,
            }),
        })
    }

    /// Same store and layout viewed with another context length.
    pub fn with_context(&self, context: usize) -> Result<Self, TreeError> {
        if context == 0 {
            return Err(TreeError::ZeroContext);
        }
        Ok(Self {
            store: self.store,
            context,
            layout: Arc::clone(&self.layout),
        })
    }

    /// The viewed store.
    pub fn store(&self) -> &'s RcsStore {
        self.store
    }

    /// Window length the view is built for.
    pub fn context(&self) -> usize {
        self.context
    }

    /// Reference length.
    pub fn reference_len(&self) -> usize {
        self.store.reference_len()
    }

    /// Sorted breakpoints of the reference path.
    pub fn breakpoints(&self) -> &[usize] {
        &self.layout.breakpoints
    }

    /// Node at the start of the reference.
    pub fn root(&self) -> Node {
        self.node_at(0)
    }

    /// Empty base node sitting at reference `position`; its children are the
    /// base run starting there and the alleles forking there.
    pub fn node_at(&self, position: usize) -> Node {
        let position = position.min(self.reference_len());
        Node::base(position..position, self.base_subset(position))
    }

    /// Whether `node` is the terminal node.
    pub fn is_nil(&self, node: &Node) -> bool {
        node.is_nil()
    }

    /// Children of `node` in deterministic order: reference first, then
    /// alternative alleles ascending. A node with nothing after it has the
    /// single child [`Node::nil`]; the nil node has none.
    pub fn children(&self, node: &Node) -> Vec<Node> {
        let children = match node.lineage {
            Lineage::Nil => return Vec::new(),
            Lineage::Base => self.base_children(node.extent.end),
            Lineage::Branch {
                root,
                chain,
                budget,
            } => {
                // An insertion leaves the position unchanged; its own edit
                // must not be picked up again there.
                let after_insertion = matches!(
                    &node.label,
                    Allele::Alternate(allele) if allele.span == 0
                );
                self.branch_children(
                    node.extent.end,
                    &node.subset,
                    BranchCursor {
                        budget,
                        root,
                        chain: chain + node.emitted_len(),
                        after_insertion,
                    },
                )
            }
        };
        if children.is_empty() {
            vec![Node::nil()]
        } else {
            children
        }
    }

    /// Next breakpoint strictly after `position`.
    pub(crate) fn next_breakpoint(&self, position: usize) -> usize {
        let idx = self.layout.breakpoints.partition_point(|&b| b <= position);
        self.layout
            .breakpoints
            .get(idx)
            .copied()
            .unwrap_or_else(|| self.reference_len())
    }

    /// Haplotypes that are plain reference over the run starting at `position`.
    fn base_subset(&self, position: usize) -> Coverage {
        let journals = self.store.journals();
        let mut subset = Coverage::full(journals.len());
        subset.retain(|h| {
            journals[h]
                .last_at_or_before(position)
                .map_or(true, |edit| edit.span == 0 || position >= edit.end())
        });
        subset
    }

    fn base_children(&self, q: usize) -> Vec<Node> {
        let mut children = Vec::new();
        if q < self.reference_len() {
            let end = self.next_breakpoint(q);
            children.push(Node::base(q..end, self.base_subset(q)));
        }

        let edit_starts = &self.layout.edit_starts;
        let start = edit_starts.partition_point(|&(p, _, _)| p < q);
        let mut alleles: BTreeMap<AltAllele, Coverage> = BTreeMap::new();
        let haplotypes = self.store.haplotype_count();
        for &(_, haplotype, idx) in edit_starts[start..]
            .iter()
            .take_while(|&&(p, _, _)| p == q)
        {
            let edit = &self.store.journals()[haplotype].edits()[idx];
            alleles
                .entry(AltAllele::from(edit))
                .or_insert_with(|| Coverage::empty(haplotypes))
                .insert(haplotype);
        }
        children.extend(
            alleles
                .into_iter()
                .map(|(allele, subset)| self.alt_node(q, allele, subset, q, 0)),
        );
        children
    }

    fn branch_children(&self, p: usize, subset: &Coverage, cursor: BranchCursor) -> Vec<Node> {
        let BranchCursor {
            budget,
            root,
            chain,
            after_insertion,
        } = cursor;
        if budget == 0 {
            return Vec::new();
        }
        let journals = self.store.journals();
        let mut alleles: BTreeMap<AltAllele, Coverage> = BTreeMap::new();
        let mut next_edit = usize::MAX;
        let mut reference_members = subset.clone();

        for h in subset.iter() {
            let journal = &journals[h];
            match journal.edit_at(p).filter(|_| !after_insertion) {
                Some((_, edit)) => {
                    alleles
                        .entry(AltAllele::from(edit))
                        .or_insert_with(|| Coverage::empty(subset.universe()))
                        .insert(h);
                    reference_members.remove(h);
                }
                None => {
                    if let Some(edit) = journal.first_at_or_after(p + 1) {
                        next_edit = next_edit.min(edit.position);
                    }
                }
            }
        }

        let mut children = Vec::new();
        let n = self.reference_len();
        if p < n && !reference_members.is_empty() {
            let end = (p + budget).min(n).min(next_edit);
            children.push(Node {
                label: Allele::Reference,
                extent: p..end,
                subset: reference_members,
                lineage: Lineage::Branch {
                    root,
                    chain,
                    budget: budget - (end - p),
                },
            });
        }
        children.extend(
            alleles
                .into_iter()
                .map(|(allele, members)| self.alt_node(p, allele, members, root, chain)),
        );
        children
    }

    fn alt_node(
        &self,
        position: usize,
        allele: AltAllele,
        subset: Coverage,
        root: usize,
        chain: usize,
    ) -> Node {
        Node {
            extent: position..position + allele.span,
            label: Allele::Alternate(allele),
            subset,
            lineage: Lineage::Branch {
                root,
                chain,
                budget: self.context - 1,
            },
        }
    }
}
