//! Depth-first traversal of one reference range.
//!
//! The walk keeps an explicit stack of `(node, state)` frames instead of
//! recursing, so deep branch chains cost heap, not call stack. The visitor's
//! per-path state is cloned whenever the path forks and moved into the first
//! child, which keeps reference runs free of copies.

use std::ops::Range;

use crate::sequence::Symbol;
use crate::store::HaplotypeId;

use super::node::Lineage;
use super::{Allele, Coverage, Node, SequenceTree, TreeError};

/// Where the current path symbol comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Reference symbol at this coordinate.
    Reference(usize),
    /// Payload symbol `offset` of the allele at reference `position`.
    Payload {
        /// Reference position of the allele.
        position: usize,
        /// Offset within the payload.
        offset: usize,
    },
}

impl Origin {
    /// Reference coordinate of the symbol (allele position for payloads).
    pub fn reference_position(&self) -> usize {
        match *self {
            Origin::Reference(position) => position,
            Origin::Payload { position, .. } => position,
        }
    }
}

/// One symbol along a traversal path, with lazy access to who shares it.
#[derive(Debug)]
pub struct Step<'t> {
    tree: &'t SequenceTree<'t>,
    node: &'t Node,
    origin: Origin,
    /// Branch symbols emitted since the fork, this one included.
    chain: usize,
    report: bool,
}

impl<'t> Step<'t> {
    /// Source of the symbol.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Node emitting the symbol.
    pub fn node(&self) -> &Node {
        self.node
    }

    /// `false` while replaying context before the walked range.
    pub fn is_reported(&self) -> bool {
        self.report
    }

    /// Haplotypes whose own last `context` symbols equal the path's.
    pub fn window_coverage(&self) -> Coverage {
        let context = self.tree.context();
        let journals = self.tree.store().journals();
        match self.node.lineage {
            Lineage::Branch { root, .. } => {
                let mut coverage = self.node.subset.clone();
                if self.chain < context {
                    let window_start = root as isize - (context - self.chain) as isize;
                    coverage.retain(|h| {
                        journals[h]
                            .previous_end(root)
                            .map_or(true, |end| end as isize <= window_start)
                    });
                }
                coverage
            }
            Lineage::Base | Lineage::Nil => {
                let j = self.origin.reference_position();
                let mut coverage = Coverage::full(journals.len());
                coverage.retain(|h| {
                    journals[h]
                        .last_at_or_before(j)
                        .map_or(true, |edit| j >= edit.end() + context - 1)
                });
                coverage
            }
        }
    }

    /// Coordinate of this symbol within haplotype `haplotype`, if it carries it.
    pub fn haplotype_position(&self, haplotype: HaplotypeId) -> Option<usize> {
        let journal = self.tree.store().journal(haplotype)?;
        match self.origin {
            Origin::Reference(position) => journal.haplotype_coordinate(position),
            Origin::Payload { position, offset } => {
                let (idx, _) = journal.edit_at(position)?;
                journal.edit_start(idx).map(|start| start + offset)
            }
        }
    }
}

/// Receives every symbol of every path of a walk.
pub trait PathVisitor {
    /// Per-path state, cloned at forks.
    type State: Clone;

    /// Advance `state` by `symbol`.
    fn step(&mut self, state: &mut Self::State, symbol: Symbol, step: &Step<'_>);

    /// Called once with the final state of every path.
    fn end_path(&mut self, _state: Self::State) {}
}

struct Frame<S> {
    node: Node,
    state: S,
}

impl<'s> SequenceTree<'s> {
    /// Visit every path of `range` depth-first.
    ///
    /// The `context - 1` reference symbols before `range.start` are replayed
    /// first with [`Step::is_reported`] false. Base symbols are emitted up to
    /// `range.end`; branches forking at base positions inside the range are
    /// followed to their end even past it. Insertions at the reference end
    /// belong to the range ending there.
    pub fn walk<V: PathVisitor>(
        &self,
        range: Range<usize>,
        visitor: &mut V,
        initial: V::State,
    ) -> Result<(), TreeError> {
        let n = self.reference_len();
        if range.start >= range.end || range.end > n {
            return Err(TreeError::InvalidRange {
                start: range.start,
                end: range.end,
                length: n,
            });
        }
        let reference = self.store().reference();
        let mut state = initial;

        let warm_start = range.start.saturating_sub(self.context() - 1);
        let warm = Node::base(warm_start..range.start, Coverage::default());
        for (position, symbol) in (warm_start..range.start).zip(reference.range(warm_start, range.start)) {
            let step = Step {
                tree: self,
                node: &warm,
                origin: Origin::Reference(position),
                chain: 0,
                report: false,
            };
            visitor.step(&mut state, symbol, &step);
        }

        let mut stack = vec![Frame {
            node: self.node_at(range.start),
            state,
        }];

        while let Some(Frame { node, mut state }) = stack.pop() {
            let chain = match node.lineage {
                Lineage::Branch { chain, .. } => chain,
                _ => 0,
            };
            match &node.label {
                Allele::Alternate(allele) => {
                    for (offset, &symbol) in allele.payload.iter().enumerate() {
                        let step = Step {
                            tree: self,
                            node: &node,
                            origin: Origin::Payload {
                                position: node.extent.start,
                                offset,
                            },
                            chain: chain + offset + 1,
                            report: true,
                        };
                        visitor.step(&mut state, symbol, &step);
                    }
                }
                Allele::Reference => {
                    let end = if node.is_base() {
                        node.extent.end.min(range.end)
                    } else {
                        node.extent.end
                    };
                    let start = node.extent.start;
                    for (position, symbol) in (start..end).zip(reference.range(start, end)) {
                        let step = Step {
                            tree: self,
                            node: &node,
                            origin: Origin::Reference(position),
                            chain: chain + (position - start) + 1,
                            report: true,
                        };
                        visitor.step(&mut state, symbol, &step);
                    }
                }
            }

            if node.is_base() && node.extent.end > range.end {
                visitor.end_path(state);
                continue;
            }

            let from_base = node.is_base();
            let mut children = self
                .children(&node)
                .into_iter()
                .filter(|child| {
                    if child.is_nil() {
                        false
                    } else if child.is_base() {
                        child.extent.start < range.end
                    } else if from_base {
                        let q = child.extent.start;
                        q < range.end || (q == n && range.end == n)
                    } else {
                        true
                    }
                });

            let first = children.next();
            let rest: Vec<Node> = children.collect();
            for child in rest.into_iter().rev() {
                stack.push(Frame {
                    node: child,
                    state: state.clone(),
                });
            }
            match first {
                Some(child) => stack.push(Frame { node: child, state }),
                None => visitor.end_path(state),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::Edit;
    use crate::sequence::encode;
    use crate::store::RcsStore;

    fn syms(s: &str) -> Vec<Symbol> {
        encode(s.as_bytes()).unwrap()
    }

    /// Records the trailing window and coverage of every reported symbol.
    #[derive(Default)]
    struct WindowCollector {
        context: usize,
        seen: Vec<(Vec<Symbol>, Vec<(HaplotypeId, usize)>)>,
        warm_up: usize,
    }

    impl PathVisitor for WindowCollector {
        type State = Vec<Symbol>;

        fn step(&mut self, state: &mut Vec<Symbol>, symbol: Symbol, step: &Step<'_>) {
            state.push(symbol);
            if state.len() > self.context {
                state.remove(0);
            }
            if !step.is_reported() {
                self.warm_up += 1;
                return;
            }
            let covered = step
                .window_coverage()
                .iter()
                .filter_map(|h| step.haplotype_position(h).map(|pos| (h, pos)))
                .collect();
            self.seen.push((state.clone(), covered));
        }
    }

    fn assert_every_window_covered(store: &RcsStore, context: usize, cuts: &[usize]) {
        let tree = SequenceTree::new(store, context).unwrap();
        let mut collector = WindowCollector {
            context,
            ..Default::default()
        };
        for bounds in cuts.windows(2) {
            tree.walk(bounds[0]..bounds[1], &mut collector, Vec::new())
                .unwrap();
        }

        for h in 0..store.haplotype_count() {
            let sequence = store.sequence_at(h).unwrap().to_vec();
            for (i, _) in sequence.iter().enumerate() {
                let window = sequence[i.saturating_sub(context - 1)..=i].to_vec();
                let hit = collector
                    .seen
                    .iter()
                    .find(|(path, covered)| covered.contains(&(h, i)) && *path == window);
                assert!(hit.is_some(), "haplotype {h} position {i} not covered");
            }
        }
        for (path, covered) in &collector.seen {
            for &(h, i) in covered {
                let sequence = store.sequence_at(h).unwrap().to_vec();
                let window = sequence[(i + 1).saturating_sub(path.len())..=i].to_vec();
                assert_eq!(&window, path, "haplotype {h} position {i} wrongly covered");
            }
        }
    }

    #[test]
    fn walk_rejects_bad_ranges() {
        let store = RcsStore::new(&syms("ACGT")).unwrap();
        let tree = SequenceTree::new(&store, 2).unwrap();
        let mut collector = WindowCollector::default();
        assert!(tree.walk(2..2, &mut collector, Vec::new()).is_err());
        assert!(tree.walk(0..5, &mut collector, Vec::new()).is_err());
    }

    #[test]
    fn warm_up_replays_context() {
        let store = RcsStore::new(&syms("ACGTACGT")).unwrap();
        let tree = SequenceTree::new(&store, 3).unwrap();
        let mut collector = WindowCollector {
            context: 3,
            ..Default::default()
        };
        tree.walk(4..8, &mut collector, Vec::new()).unwrap();
        assert_eq!(collector.warm_up, 2);
        assert_eq!(collector.seen.len(), 4);
        assert_eq!(collector.seen[0].0, syms("GTA"));
    }

    #[derive(Default)]
    struct PathCounter {
        symbols: usize,
        ended: Vec<usize>,
    }

    impl PathVisitor for PathCounter {
        type State = usize;

        fn step(&mut self, state: &mut usize, _symbol: Symbol, _step: &Step<'_>) {
            *state += 1;
            self.symbols += 1;
        }

        fn end_path(&mut self, state: usize) {
            self.ended.push(state);
        }
    }

    #[test]
    fn every_path_ends_once() {
        let mut store = RcsStore::new(&syms("ACGTACGT")).unwrap();
        store.add_journal(vec![Edit::substitution(4, syms("G"))]).unwrap();
        let tree = SequenceTree::new(&store, 2).unwrap();
        let mut counter = PathCounter::default();
        tree.walk(0..8, &mut counter, 0).unwrap();
        // Reference path, then the substitution plus one trailing symbol.
        assert_eq!(counter.ended, vec![8, 6]);
        assert_eq!(counter.symbols, 10);
    }

    #[test]
    fn windows_are_covered_across_edit_kinds() {
        let mut store = RcsStore::new(&syms("ACGTACGTTGCAACGT")).unwrap();
        store
            .add_journal(vec![Edit::substitution(4, syms("G")), Edit::deletion(6, 2)])
            .unwrap();
        store
            .add_journal(vec![Edit::insertion(0, syms("TT")), Edit::insertion(16, syms("CC"))])
            .unwrap();
        store
            .add_journal(vec![Edit::deletion(3, 1), Edit::insertion(4, syms("A"))])
            .unwrap();
        store.add_journal(Vec::new()).unwrap();

        for context in [1, 2, 3, 5] {
            assert_every_window_covered(&store, context, &[0, 16]);
            assert_every_window_covered(&store, context, &[0, 5, 9, 16]);
        }
    }
}
