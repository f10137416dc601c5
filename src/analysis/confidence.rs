use log::debug;
use ndarray::{Array2, Axis, Zip};
use serde::Serialize;

use crate::{
    analysis::scores::{GridScores, SymmetryScores, first_argmax},
    error::Result,
};

/// Turns per-offset block scores into a per-block confidence of authenticity.
///
/// A block whose strongest grid offset is the globally dominant one is taken
/// as authentic and gets confidence 1.0. Every other block gets
/// `1 - max score`, clamped to `[0, 1]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfidenceAggregator;

impl ConfidenceAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate_symmetries(&self, scores: &SymmetryScores) -> Result<ConfidenceMap> {
        let grid = scores.grid_scores()?;
        Ok(self.aggregate(&grid))
    }

    pub fn aggregate(&self, grid: &GridScores) -> ConfidenceMap {
        let best_grid = grid.best_grid();
        let (rows, cols) = grid.grid_dim();

        let mut values = Array2::zeros((rows, cols));
        let mut authentic = Array2::from_elem((rows, cols), false);

        Zip::from(&mut values)
            .and(&mut authentic)
            .and(grid.scores().lanes(Axis(0)))
            .for_each(|confidence, is_authentic, lane| {
                let (strongest, max_score) = first_argmax(lane.iter());

                *is_authentic = strongest == best_grid;
                *confidence = if *is_authentic {
                    1.0
                } else {
                    (1.0 - max_score).clamp(0.0, 1.0)
                };
            });

        let map = ConfidenceMap {
            values,
            authentic,
            best_grid,
        };

        debug!(
            "aggregated {}x{} block grid, best grid {}, {} suspicious block(s)",
            rows,
            cols,
            best_grid,
            map.suspicious_block_count()
        );

        map
    }
}

/// Per-block confidence of authenticity; 1.0 means no detection.
#[derive(Debug, Clone)]
pub struct ConfidenceMap {
    values: Array2<f64>,
    authentic: Array2<bool>,
    best_grid: usize,
}

impl ConfidenceMap {
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Blocks whose strongest grid offset matched the dominant one.
    pub fn authentic_mask(&self) -> &Array2<bool> {
        &self.authentic
    }

    pub fn best_grid(&self) -> usize {
        self.best_grid
    }

    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// `1 - confidence`; high values mark suspected forgeries.
    pub fn error_map(&self) -> Array2<f64> {
        self.values.mapv(|c| 1.0 - c)
    }

    pub fn suspicious_block_count(&self) -> usize {
        self.authentic.iter().filter(|&&a| !a).count()
    }

    pub fn summary(&self) -> ConfidenceSummary {
        let (rows, cols) = self.dim();
        let total = rows * cols;

        ConfidenceSummary {
            rows,
            cols,
            best_grid: self.best_grid,
            suspicious_blocks: self.suspicious_block_count(),
            mean_confidence: self.values.sum() / total as f64,
            min_confidence: self.values.iter().cloned().fold(1.0, f64::min),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceSummary {
    pub rows: usize,
    pub cols: usize,
    pub best_grid: usize,
    pub suspicious_blocks: usize,
    pub mean_confidence: f64,
    pub min_confidence: f64,
}
