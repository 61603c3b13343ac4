// ============================================================
// Weight Pruning Engine
// ============================================================
// Zeroes the lowest-magnitude part of one weight matrix.
//
//   Vanilla   — k = floor((1 - keep) * rows * cols) entries with the
//               smallest |w|, ties broken by flattened position
//   Channel   — k = floor((1 - keep) * rows) whole rows with the
//               smallest Σ|w| over the row
//   MultiHead — the matrix is viewed as `num_heads` contiguous
//               row blocks; k = floor((1 - keep) * num_heads) blocks
//               with the smallest Σ|w| are zeroed
//
// Matrices are output-major ([out, in]), so a row is an output
// channel and a head is `head_size` consecutive rows.
//
// The engine keeps no state between calls. A caller that wants the
// same heads zeroed in several matrices passes the `Selection`
// returned by the first call back in as `shared`.
//
// Reference: Han et al. (2015) Learning both Weights and Connections
//            Michel et al. (2019) Are Sixteen Heads Really Better than One?

use ndarray::Array2;

use crate::domain::error::PruneError;
use crate::domain::prune_plan::PruneMode;
use crate::domain::weight_group::ModelDims;

/// Indices zeroed by one pruning call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Flattened (row-major) entry positions
    Entries(Vec<usize>),
    /// Row indices
    Rows(Vec<usize>),
    /// Head (row block) indices
    Heads(Vec<usize>),
}

impl Selection {
    pub fn indices(&self) -> &[usize] {
        match self {
            Selection::Entries(i) | Selection::Rows(i) | Selection::Heads(i) => i,
        }
    }

    pub fn len(&self) -> usize {
        self.indices().len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices().is_empty()
    }

    fn kind(&self) -> &'static str {
        match self {
            Selection::Entries(_) => "entries",
            Selection::Rows(_)    => "rows",
            Selection::Heads(_)   => "heads",
        }
    }
}

/// How an attention projection splits into heads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadLayout {
    pub num_heads:   usize,
    pub head_size:   usize,
    pub hidden_size: usize,
}

impl HeadLayout {
    pub fn from_dims(dims: &ModelDims) -> Self {
        Self {
            num_heads:   dims.num_heads,
            head_size:   dims.head_size(),
            hidden_size: dims.hidden_size,
        }
    }

    /// Element count a matrix must have to be split into heads
    pub fn element_count(&self) -> usize {
        self.num_heads * self.head_size * self.hidden_size
    }
}

/// Stateless pruning engine configured with the model's head layout
#[derive(Debug, Clone, Copy)]
pub struct WeightPruner {
    heads: HeadLayout,
}

impl WeightPruner {
    pub fn new(heads: HeadLayout) -> Self {
        Self { heads }
    }

    /// Prune `weight` so that roughly `keep_ratio` of it survives.
    ///
    /// Returns the pruned matrix and the selection that was zeroed.
    /// When `shared` is given it is applied verbatim instead of
    /// computing a new selection; its kind must match `mode`.
    pub fn apply(
        &self,
        mut weight: Array2<f32>,
        keep_ratio: f64,
        mode:       PruneMode,
        shared:     Option<&Selection>,
    ) -> Result<(Array2<f32>, Selection), PruneError> {
        if !(keep_ratio > 0.0 && keep_ratio <= 1.0) {
            return Err(PruneError::InvalidRatio(keep_ratio));
        }

        let selection = match mode {
            PruneMode::Vanilla   => self.select_entries(&weight, keep_ratio, shared)?,
            PruneMode::Channel   => self.select_rows(&weight, keep_ratio, shared)?,
            PruneMode::MultiHead => self.select_heads(&weight, keep_ratio, shared)?,
        };

        let head_block = self.head_block(&weight);
        zero_selection(&mut weight, &selection, head_block);
        Ok((weight, selection))
    }

    fn select_entries(
        &self,
        weight:     &Array2<f32>,
        keep_ratio: f64,
        shared:     Option<&Selection>,
    ) -> Result<Selection, PruneError> {
        if let Some(shared) = shared {
            return reuse(shared, PruneMode::Vanilla, weight.len());
        }

        let magnitudes: Vec<f64> = weight.iter().map(|w| w.abs() as f64).collect();
        let k = prune_count(keep_ratio, weight.len());
        Ok(Selection::Entries(bottom_k(&magnitudes, k)))
    }

    fn select_rows(
        &self,
        weight:     &Array2<f32>,
        keep_ratio: f64,
        shared:     Option<&Selection>,
    ) -> Result<Selection, PruneError> {
        if let Some(shared) = shared {
            return reuse(shared, PruneMode::Channel, weight.nrows());
        }

        let row_norms: Vec<f64> = weight
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|w| w.abs() as f64).sum())
            .collect();
        let k = prune_count(keep_ratio, weight.nrows());
        Ok(Selection::Rows(bottom_k(&row_norms, k)))
    }

    fn select_heads(
        &self,
        weight:     &Array2<f32>,
        keep_ratio: f64,
        shared:     Option<&Selection>,
    ) -> Result<Selection, PruneError> {
        let expected = self.heads.element_count();
        if weight.len() != expected || self.heads.num_heads == 0 {
            return Err(PruneError::ShapeMismatch {
                mode: PruneMode::MultiHead,
                expected,
                rows: weight.nrows(),
                cols: weight.ncols(),
            });
        }

        if let Some(shared) = shared {
            return reuse(shared, PruneMode::MultiHead, self.heads.num_heads);
        }

        let block = expected / self.heads.num_heads;
        let mut head_norms = vec![0.0f64; self.heads.num_heads];
        for (i, w) in weight.iter().enumerate() {
            head_norms[i / block] += w.abs() as f64;
        }

        let k = prune_count(keep_ratio, self.heads.num_heads);
        Ok(Selection::Heads(bottom_k(&head_norms, k)))
    }

    /// Flattened length of one head block for this matrix
    fn head_block(&self, weight: &Array2<f32>) -> usize {
        (weight.len() / self.heads.num_heads.max(1)).max(1)
    }
}

/// Number of units to zero: floor((1 - keep) * total)
pub fn prune_count(keep_ratio: f64, total: usize) -> usize {
    let k = ((1.0 - keep_ratio) * total as f64).floor();
    (k.max(0.0) as usize).min(total)
}

/// Indices of the `k` smallest scores, ascending by (score, index).
///
/// Ties go to the lower index, so selection is deterministic.
fn bottom_k(scores: &[f64], k: usize) -> Vec<usize> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let by_score = |a: &usize, b: &usize| scores[*a].total_cmp(&scores[*b]).then(a.cmp(b));

    let mut order: Vec<usize> = (0..scores.len()).collect();
    if k < order.len() {
        order.select_nth_unstable_by(k - 1, by_score);
        order.truncate(k);
    }
    order.sort_unstable_by(by_score);
    order
}

fn reuse(shared: &Selection, mode: PruneMode, bound: usize) -> Result<Selection, PruneError> {
    let matches_mode = matches!(
        (mode, shared),
        (PruneMode::Vanilla, Selection::Entries(_))
            | (PruneMode::Channel, Selection::Rows(_))
            | (PruneMode::MultiHead, Selection::Heads(_))
    );
    if !matches_mode || shared.indices().iter().any(|&i| i >= bound) {
        return Err(PruneError::SelectionMismatch { mode, selection: shared.kind() });
    }
    Ok(shared.clone())
}

fn zero_selection(weight: &mut Array2<f32>, selection: &Selection, head_block: usize) {
    let cols = weight.ncols();
    match selection {
        Selection::Entries(entries) => {
            for &i in entries {
                weight[[i / cols, i % cols]] = 0.0;
            }
        }
        Selection::Rows(rows) => {
            for &r in rows {
                weight.row_mut(r).fill(0.0);
            }
        }
        Selection::Heads(heads) => {
            let mut pruned = vec![false; weight.len() / head_block];
            for &h in heads {
                pruned[h] = true;
            }
            for (i, w) in weight.iter_mut().enumerate() {
                if pruned[i / head_block] {
                    *w = 0.0;
                }
            }
        }
    }
}
