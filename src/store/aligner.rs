//! Alignment collaborator turning a raw haplotype into journal edits.

use thiserror::Error;

use crate::journal::Edit;
use crate::sequence::Symbol;

// Traceback byte: bits 0-1 hold the source of H, bit 2 marks an extended
// insertion, bit 3 an extended deletion.
const FROM_DIAG: u8 = 0;
const FROM_DEL: u8 = 1; // reference symbol consumed, nothing emitted
const FROM_INS: u8 = 2; // haplotype symbol emitted, reference untouched
const INS_EXTEND: u8 = 1 << 2;
const DEL_EXTEND: u8 = 1 << 3;

const INF: u32 = u32::MAX / 4;

/// Cost of one mismatching column.
pub const MISMATCH_COST: u32 = 4;
/// Cost of opening a gap, paid once per gap on top of the extension.
pub const GAP_OPEN_COST: u32 = 6;
/// Cost of every gap column.
pub const GAP_EXTEND_COST: u32 = 1;

/// Default number of diagonals kept on either side of the length difference.
pub const DEFAULT_BAND_PADDING: usize = 64;

/// Default cap on traceback cells (one byte each).
pub const DEFAULT_MAX_CELLS: usize = 1 << 28;

/// Errors raised while deriving edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    /// The banded traceback would exceed the configured cell limit.
    #[error("alignment needs {cells} traceback cells, limit is {limit}")]
    TooLarge {
        /// Cells the band would need.
        cells: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Computes the edits that turn the reference into a haplotype.
///
/// Implementations must return edits sorted by position and free of overlaps;
/// the store rejects anything else.
pub trait EditAligner {
    /// Align `haplotype` against `reference`.
    fn align(&self, reference: &[Symbol], haplotype: &[Symbol]) -> Result<Vec<Edit>, AlignError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlignOp {
    Match,
    Mismatch,
    Deletion,
    Insertion,
}

impl AlignOp {
    /// Symbols consumed on (reference, haplotype).
    fn advance(self) -> (usize, usize) {
        match self {
            AlignOp::Match | AlignOp::Mismatch => (1, 1),
            AlignOp::Deletion => (1, 0),
            AlignOp::Insertion => (0, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Track {
    Best,
    Deletion,
    Insertion,
}

/// Banded global aligner with affine gap costs.
///
/// The shared prefix and suffix are peeled off first, so a lone indel or
/// substitution never reaches the dynamic program. The band over the rest
/// covers every diagonal between `0` and the length difference, widened by
/// `padding` on both sides, so a full path always exists and the traceback
/// never leaves the band. A gap costs `GAP_OPEN_COST + len * GAP_EXTEND_COST`,
/// which keeps one long indel in one edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandedAligner {
    padding: usize,
    max_cells: usize,
}

impl Default for BandedAligner {
    fn default() -> Self {
        Self::new(DEFAULT_BAND_PADDING)
    }
}

impl BandedAligner {
    /// Aligner keeping `padding` extra diagonals on each side.
    pub fn new(padding: usize) -> Self {
        Self {
            padding,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }

    /// Cap the traceback at `max_cells` cells.
    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    /// Extra diagonals kept on each side of the band.
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Largest traceback the aligner will allocate.
    pub fn max_cells(&self) -> usize {
        self.max_cells
    }

    fn alignment_ops(&self, reference: &[Symbol], haplotype: &[Symbol]) -> Result<Vec<AlignOp>, AlignError> {
        let n = reference.len() as isize;
        let m = haplotype.len() as isize;
        if n == 0 {
            return Ok(vec![AlignOp::Insertion; m as usize]);
        }
        if m == 0 {
            return Ok(vec![AlignOp::Deletion; n as usize]);
        }

        let pad = self.padding as isize;
        // Diagonal d = j - i, kept within [d_min, d_max].
        let d_min = (m - n).min(0) - pad;
        let d_max = (m - n).max(0) + pad;
        let width = (d_max - d_min + 1) as usize;
        let cells = (n as usize + 1).saturating_mul(width);
        if cells > self.max_cells {
            return Err(AlignError::TooLarge {
                cells,
                limit: self.max_cells,
            });
        }

        let gap_first = GAP_OPEN_COST + GAP_EXTEND_COST;
        let mut tb = vec![FROM_DIAG; cells];
        let mut prev_h = vec![INF; width];
        let mut prev_del = vec![INF; width];
        let mut cur_h = vec![INF; width];
        let mut cur_del = vec![INF; width];

        for i in 0..=n {
            cur_h.fill(INF);
            cur_del.fill(INF);
            let mut ins = INF;
            for slot in 0..width {
                let j = i + d_min + slot as isize;
                if j < 0 || j > m {
                    ins = INF;
                    continue;
                }
                if i == 0 && j == 0 {
                    cur_h[slot] = 0;
                    ins = INF;
                    continue;
                }
                let mut code = 0;

                // Insertion: (i, j - 1) -> (i, j), left neighbour in this row.
                if j > 0 && slot > 0 {
                    let open = cur_h[slot - 1] + gap_first;
                    let extend = ins + GAP_EXTEND_COST;
                    if extend <= open {
                        ins = extend;
                        code |= INS_EXTEND;
                    } else {
                        ins = open;
                    }
                } else {
                    ins = INF;
                }

                // Deletion: (i - 1, j) -> (i, j), one slot up in the previous row.
                let mut del = INF;
                if i > 0 && slot + 1 < width {
                    let open = prev_h[slot + 1] + gap_first;
                    let extend = prev_del[slot + 1] + GAP_EXTEND_COST;
                    if extend <= open {
                        del = extend;
                        code |= DEL_EXTEND;
                    } else {
                        del = open;
                    }
                }

                let mut best = (INF, FROM_DIAG);
                if i > 0 && j > 0 {
                    let mismatch = reference[(i - 1) as usize] != haplotype[(j - 1) as usize];
                    best = (prev_h[slot] + if mismatch { MISMATCH_COST } else { 0 }, FROM_DIAG);
                }
                if del < best.0 {
                    best = (del, FROM_DEL);
                }
                if ins < best.0 {
                    best = (ins, FROM_INS);
                }

                cur_h[slot] = best.0.min(INF);
                cur_del[slot] = del.min(INF);
                ins = ins.min(INF);
                tb[i as usize * width + slot] = code | best.1;
            }
            std::mem::swap(&mut prev_h, &mut cur_h);
            std::mem::swap(&mut prev_del, &mut cur_del);
        }

        let mut ops = Vec::with_capacity(n.max(m) as usize);
        let (mut i, mut j) = (n, m);
        let mut track = Track::Best;
        while i > 0 || j > 0 {
            let code = tb[i as usize * width + (j - i - d_min) as usize];
            match track {
                Track::Best if i > 0 && j > 0 && code & 0b11 == FROM_DIAG => {
                    let same = reference[(i - 1) as usize] == haplotype[(j - 1) as usize];
                    ops.push(if same { AlignOp::Match } else { AlignOp::Mismatch });
                    i -= 1;
                    j -= 1;
                }
                Track::Best => {
                    track = if code & 0b11 == FROM_INS || i == 0 {
                        Track::Insertion
                    } else {
                        Track::Deletion
                    };
                }
                Track::Deletion => {
                    ops.push(AlignOp::Deletion);
                    if code & DEL_EXTEND == 0 || i == 1 {
                        track = Track::Best;
                    }
                    i -= 1;
                }
                Track::Insertion => {
                    ops.push(AlignOp::Insertion);
                    if code & INS_EXTEND == 0 || j == 1 {
                        track = Track::Best;
                    }
                    j -= 1;
                }
            }
        }
        ops.reverse();
        Ok(ops)
    }
}

impl EditAligner for BandedAligner {
    fn align(&self, reference: &[Symbol], haplotype: &[Symbol]) -> Result<Vec<Edit>, AlignError> {
        let prefix = reference
            .iter()
            .zip(haplotype)
            .take_while(|(a, b)| a == b)
            .count();
        let shared_tail = reference.len().min(haplotype.len()) - prefix;
        let suffix = reference
            .iter()
            .rev()
            .zip(haplotype.iter().rev())
            .take(shared_tail)
            .take_while(|(a, b)| a == b)
            .count();
        let reference = &reference[prefix..reference.len() - suffix];
        let haplotype = &haplotype[prefix..haplotype.len() - suffix];

        let mut edits = Vec::new();
        if reference.is_empty() || haplotype.is_empty() {
            if !(reference.is_empty() && haplotype.is_empty()) {
                push_block(&mut edits, prefix, prefix + reference.len(), haplotype);
            }
            return Ok(edits);
        }

        let ops = self.alignment_ops(reference, haplotype)?;
        let (mut r, mut h) = (0, 0);
        let mut k = 0;
        while k < ops.len() {
            if ops[k] == AlignOp::Match {
                r += 1;
                h += 1;
                k += 1;
                continue;
            }
            let (block_ref, block_hap) = (r, h);
            while k < ops.len() && ops[k] != AlignOp::Match {
                let (dr, dh) = ops[k].advance();
                r += dr;
                h += dh;
                k += 1;
            }
            push_block(&mut edits, prefix + block_ref, prefix + r, &haplotype[block_hap..h]);
        }
        Ok(edits)
    }
}

/// Canonical edits for reference `[start, end)` replaced by `payload`.
fn push_block(edits: &mut Vec<Edit>, start: usize, end: usize, payload: &[Symbol]) {
    let span = end - start;
    let len = payload.len();
    if span == 0 {
        edits.push(Edit::insertion(start, payload.to_vec()));
    } else if len == 0 {
        edits.push(Edit::deletion(start, span));
    } else if len == span {
        edits.push(Edit::substitution(start, payload.to_vec()));
    } else if len > span {
        edits.push(Edit::substitution(start, payload[..span].to_vec()));
        edits.push(Edit::insertion(end, payload[span..].to_vec()));
    } else {
        edits.push(Edit::substitution(start, payload.to_vec()));
        edits.push(Edit::deletion(start + len, span - len));
    }
}
