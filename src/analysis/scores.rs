use ndarray::{Array3, Array4, ArrayD, Axis, Ix4, s};

use crate::error::{ForensicsError, Result};

/// Number of candidate grid alignments scored per block.
pub const GRID_OFFSETS: usize = 4;

/// Number of geometric variants the model evaluates per block.
pub const SYMMETRY_CHANNELS: usize = 4;

/// Grid-offset permutation that maps each symmetry channel back onto the
/// reference orientation. Row `k` is used for channel `k`.
pub const SYMMETRY_PERMUTATIONS: [[usize; GRID_OFFSETS]; SYMMETRY_CHANNELS] = [
    [0, 1, 2, 3],
    [1, 0, 3, 2],
    [2, 3, 0, 1],
    [3, 2, 1, 0],
];

/// Raw model output: probabilities indexed by
/// `[grid offset, symmetry channel, block row, block column]`.
#[derive(Debug, Clone)]
pub struct SymmetryScores {
    probabilities: Array4<f64>,
    /// Model output as received, kept so dumps replay bit-for-bit.
    log_probabilities: Option<Array4<f64>>,
}

impl SymmetryScores {
    pub fn from_probabilities(probabilities: Array4<f64>) -> Result<Self> {
        let (offsets, channels, rows, cols) = probabilities.dim();

        if offsets != GRID_OFFSETS || channels != SYMMETRY_CHANNELS {
            return Err(ForensicsError::InvalidScores(format!(
                "expected {}x{} grid offsets/symmetry channels, got {}x{}",
                GRID_OFFSETS, SYMMETRY_CHANNELS, offsets, channels
            )));
        }

        if rows == 0 || cols == 0 {
            return Err(ForensicsError::InvalidScores("empty block grid".into()));
        }

        Ok(Self {
            probabilities,
            log_probabilities: None,
        })
    }

    /// Accepts the model's log-probabilities. A leading batch axis of
    /// length 1 is dropped.
    pub fn from_log_probabilities(log_probabilities: ArrayD<f64>) -> Result<Self> {
        let mut raw = log_probabilities;
        while raw.ndim() > 4 && raw.shape()[0] == 1 {
            raw = raw.index_axis_move(Axis(0), 0);
        }

        let shape = raw.shape().to_vec();
        let raw = raw.into_dimensionality::<Ix4>().map_err(|_| {
            ForensicsError::InvalidScores(format!(
                "expected a 4-dimensional score tensor, got shape {:?}",
                shape
            ))
        })?;

        let mut scores = Self::from_probabilities(raw.mapv(f64::exp))?;
        scores.log_probabilities = Some(raw);
        Ok(scores)
    }

    pub fn probabilities(&self) -> &Array4<f64> {
        &self.probabilities
    }

    /// Log-probabilities as the model produced them, or the logarithm of the
    /// probabilities when the scores were built from probabilities.
    pub fn log_probabilities(&self) -> Array4<f64> {
        match &self.log_probabilities {
            Some(raw) => raw.clone(),
            None => self.probabilities.mapv(f64::ln),
        }
    }

    /// Block grid size as `(rows, cols)`.
    pub fn grid_dim(&self) -> (usize, usize) {
        let (_, _, rows, cols) = self.probabilities.dim();
        (rows, cols)
    }

    /// Re-indexes the grid-offset axis of every symmetry channel so that all
    /// channels refer to the same offsets. Reads only from the unaligned input.
    pub fn align(&self) -> SymmetryScores {
        let mut aligned = self.probabilities.clone();

        for (channel, permutation) in SYMMETRY_PERMUTATIONS.iter().enumerate().skip(1) {
            for (offset, &source) in permutation.iter().enumerate() {
                aligned
                    .slice_mut(s![offset, channel, .., ..])
                    .assign(&self.probabilities.slice(s![source, channel, .., ..]));
            }
        }

        SymmetryScores {
            probabilities: aligned,
            log_probabilities: None,
        }
    }

    /// Aligns the symmetry channels and averages them into one plane per
    /// grid offset.
    pub fn grid_scores(&self) -> Result<GridScores> {
        let averaged = self
            .align()
            .probabilities
            .mean_axis(Axis(1))
            .ok_or_else(|| ForensicsError::InvalidScores("no symmetry channels".into()))?;

        GridScores::new(averaged)
    }
}

/// Per-block scores for each grid offset, shape `(4, rows, cols)`.
#[derive(Debug, Clone)]
pub struct GridScores {
    scores: Array3<f64>,
}

impl GridScores {
    pub fn new(scores: Array3<f64>) -> Result<Self> {
        let (offsets, rows, cols) = scores.dim();

        if offsets != GRID_OFFSETS {
            return Err(ForensicsError::InvalidScores(format!(
                "expected {} grid offsets, got {}",
                GRID_OFFSETS, offsets
            )));
        }

        if rows == 0 || cols == 0 {
            return Err(ForensicsError::InvalidScores("empty block grid".into()));
        }

        if scores.iter().any(|v| v.is_nan()) {
            return Err(ForensicsError::InvalidScores("score grid contains NaN".into()));
        }

        Ok(Self { scores })
    }

    pub fn scores(&self) -> &Array3<f64> {
        &self.scores
    }

    pub fn grid_dim(&self) -> (usize, usize) {
        let (_, rows, cols) = self.scores.dim();
        (rows, cols)
    }

    /// Spatial mean of each grid offset's plane.
    pub fn offset_means(&self) -> Vec<f64> {
        self.scores
            .axis_iter(Axis(0))
            .map(|plane| plane.mean().unwrap_or(0.0))
            .collect()
    }

    /// Offset with the highest spatial mean; the lowest index wins ties.
    pub fn best_grid(&self) -> usize {
        first_argmax(self.offset_means().iter()).0
    }
}

/// Index and value of the first maximum.
pub(crate) fn first_argmax<'a>(values: impl IntoIterator<Item = &'a f64>) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);

    for (index, &value) in values.into_iter().enumerate() {
        if value > best.1 {
            best = (index, value);
        }
    }

    best
}
