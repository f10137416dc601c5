//! Model backends producing per-block symmetry scores.
//!
//! Every backend implements [`BlockScorer`]. The backend is picked from the
//! model file's extension by [`load_scorer`]; TorchScript and ONNX support are
//! behind the `torch` and `onnx` features.

pub mod precomputed;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "torch")]
pub mod torch;

use std::path::Path;

use log::info;
use ndarray::Array4;

use crate::{
    analysis::scores::SymmetryScores,
    error::{ForensicsError, Result},
};

pub use precomputed::PrecomputedScorer;

/// Preprocessed image in `1 x 3 x H x W` layout, values in `[0, 1]`.
pub type ImageTensor = Array4<f32>;

pub trait BlockScorer {
    /// Scores every block of `image`. Implementations return probabilities
    /// (already exponentiated) indexed by grid offset and symmetry channel.
    fn score(&mut self, image: &ImageTensor, block_size: u32) -> Result<SymmetryScores>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerKind {
    TorchScript,
    Onnx,
    Precomputed,
}

impl ScorerKind {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pt" | "pth" | "ts" => Ok(ScorerKind::TorchScript),
            "onnx" => Ok(ScorerKind::Onnx),
            "json" => Ok(ScorerKind::Precomputed),
            other => Err(ForensicsError::UnsupportedFormat(format!(
                "unrecognised model extension '{}' (expected .pt, .onnx or .json)",
                other
            ))),
        }
    }
}

pub fn load_scorer<P: AsRef<Path>>(path: P) -> Result<Box<dyn BlockScorer>> {
    let path = path.as_ref();
    let kind = ScorerKind::from_path(path)?;

    if !path.exists() {
        return Err(ForensicsError::ModelLoad {
            path: path.display().to_string(),
            reason: "model file not found".into(),
        });
    }

    let scorer: Box<dyn BlockScorer> = match kind {
        ScorerKind::Precomputed => Box::new(PrecomputedScorer::load(path)?),
        ScorerKind::TorchScript => load_torch(path)?,
        ScorerKind::Onnx => load_onnx(path)?,
    };

    info!("loaded {:?} scorer '{}' from {}", kind, scorer.name(), path.display());
    Ok(scorer)
}

#[cfg(feature = "torch")]
fn load_torch(path: &Path) -> Result<Box<dyn BlockScorer>> {
    Ok(Box::new(torch::TorchScorer::load(path)?))
}

#[cfg(not(feature = "torch"))]
fn load_torch(_path: &Path) -> Result<Box<dyn BlockScorer>> {
    Err(ForensicsError::UnsupportedFormat(
        "TorchScript models require building with the `torch` feature".into(),
    ))
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path) -> Result<Box<dyn BlockScorer>> {
    Ok(Box::new(onnx::OnnxScorer::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_path: &Path) -> Result<Box<dyn BlockScorer>> {
    Err(ForensicsError::UnsupportedFormat(
        "ONNX models require building with the `onnx` feature".into(),
    ))
}

pub(crate) fn model_name(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(fallback)
        .to_string()
}
