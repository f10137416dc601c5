use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use log::debug;
use ndarray::ArrayD;

use crate::{
    analysis::scores::SymmetryScores,
    error::{ForensicsError, Result},
    inference::{BlockScorer, ImageTensor, model_name},
};

/// Replays a saved model output instead of running a network.
///
/// The dump holds the raw log-probabilities in ndarray's serde layout
/// (`{"v": 1, "dim": [...], "data": [...]}`).
pub struct PrecomputedScorer {
    log_probabilities: ArrayD<f64>,
    name: String,
}

impl PrecomputedScorer {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let log_probabilities: ArrayD<f64> = serde_json::from_reader(reader)?;

        debug!("read score dump {} with shape {:?}", path.display(), log_probabilities.shape());

        Ok(Self::from_log_probabilities(
            log_probabilities,
            model_name(path, "precomputed"),
        ))
    }

    pub fn from_log_probabilities(log_probabilities: ArrayD<f64>, name: impl Into<String>) -> Self {
        Self {
            log_probabilities,
            name: name.into(),
        }
    }
}

impl BlockScorer for PrecomputedScorer {
    fn score(&mut self, image: &ImageTensor, block_size: u32) -> Result<SymmetryScores> {
        let scores = SymmetryScores::from_log_probabilities(self.log_probabilities.clone())?;

        let (rows, cols) = scores.grid_dim();
        let (_, _, height, width) = image.dim();
        let block = block_size as usize;

        if rows * block > height || cols * block > width {
            return Err(ForensicsError::InvalidScores(format!(
                "{}x{} block grid at block size {} does not fit a {}x{} image",
                rows, cols, block_size, width, height
            )));
        }

        Ok(scores)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Writes `scores` as a log-probability dump readable by [`PrecomputedScorer`].
///
/// JSON has no encoding for infinities, so a score of exactly zero (`-inf`
/// once logged) is refused rather than written as `null`.
pub fn save_scores<P: AsRef<Path>>(scores: &SymmetryScores, path: P) -> Result<()> {
    let log_probabilities = scores.log_probabilities();

    if let Some(value) = log_probabilities.iter().find(|v| !v.is_finite()) {
        return Err(ForensicsError::InvalidScores(format!(
            "cannot dump non-finite log-probability {}",
            value
        )));
    }

    let log_probabilities = log_probabilities.into_dyn();
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &log_probabilities)?;
    Ok(())
}
