use std::path::Path;

use log::debug;
use ndarray::{ArrayD, IxDyn};
use ort::{session::Session, value::Tensor};

use crate::{
    analysis::scores::SymmetryScores,
    error::{ForensicsError, Result},
    inference::{BlockScorer, ImageTensor, model_name},
};

/// ONNX export of the network. The block size is fixed when the graph is
/// exported, so only the image is fed at run time.
pub struct OnnxScorer {
    session: Session,
    name: String,
}

impl OnnxScorer {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let session = Session::builder()
            .map_err(|e| load_error(path, e))?
            .commit_from_file(path)
            .map_err(|e| load_error(path, e))?;

        debug!("ONNX session created from {}", path.display());

        Ok(Self {
            session,
            name: model_name(path, "onnx-model"),
        })
    }
}

fn load_error(path: &Path, e: impl std::fmt::Display) -> ForensicsError {
    ForensicsError::ModelLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

impl BlockScorer for OnnxScorer {
    fn score(&mut self, image: &ImageTensor, block_size: u32) -> Result<SymmetryScores> {
        debug!("running ONNX graph, requested block size {}", block_size);

        let shape: Vec<i64> = image.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = image.iter().copied().collect();
        let input = Tensor::from_array((shape, data))
            .map_err(|e| ForensicsError::Inference(format!("tensor creation error: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| ForensicsError::Inference(e.to_string()))?;

        let (_name, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| ForensicsError::Inference("no output tensor".into()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ForensicsError::Inference(format!("tensor extraction failed: {}", e)))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let values: Vec<f64> = data.iter().map(|&v| v as f64).collect();

        let array = ArrayD::from_shape_vec(IxDyn(&dims), values)
            .map_err(|e| ForensicsError::InvalidScores(e.to_string()))?;
        SymmetryScores::from_log_probabilities(array)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
