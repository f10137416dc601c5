use std::path::Path;

use log::debug;
use ndarray::{ArrayD, IxDyn};
use tch::{CModule, Device, IValue, Kind, Tensor};

use crate::{
    analysis::scores::SymmetryScores,
    error::{ForensicsError, Result},
    inference::{BlockScorer, ImageTensor, model_name},
};

/// TorchScript module called as `forward(image, block_size)`, returning
/// log-probabilities.
pub struct TorchScorer {
    module: CModule,
    device: Device,
    name: String,
}

impl TorchScorer {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::cuda_if_available();

        let mut module = CModule::load_on_device(path, device).map_err(|e| ForensicsError::ModelLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        module.set_eval();

        debug!("TorchScript module {} loaded on {:?}", path.display(), device);

        Ok(Self {
            module,
            device,
            name: model_name(path, "torchscript"),
        })
    }
}

impl BlockScorer for TorchScorer {
    fn score(&mut self, image: &ImageTensor, block_size: u32) -> Result<SymmetryScores> {
        let shape: Vec<i64> = image.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = image.iter().copied().collect();
        let input = Tensor::from_slice(&data).view(shape.as_slice()).to_device(self.device);

        let output = tch::no_grad(|| {
            self.module
                .forward_is(&[IValue::Tensor(input), IValue::Int(block_size as i64)])
        })
        .map_err(|e| ForensicsError::Inference(e.to_string()))?;

        let log_probabilities = match output {
            IValue::Tensor(tensor) => tensor,
            other => {
                return Err(ForensicsError::Inference(format!(
                    "expected a tensor output, got {:?}",
                    other
                )));
            }
        };

        let log_probabilities = log_probabilities
            .to_device(Device::Cpu)
            .to_kind(Kind::Double)
            .contiguous();
        let dims: Vec<usize> = log_probabilities.size().iter().map(|&d| d as usize).collect();
        let values = Vec::<f64>::try_from(&log_probabilities.flatten(0, -1))
            .map_err(|e| ForensicsError::Inference(e.to_string()))?;

        debug!("model output shape {:?}", dims);

        let array = ArrayD::from_shape_vec(IxDyn(&dims), values)
            .map_err(|e| ForensicsError::InvalidScores(e.to_string()))?;
        SymmetryScores::from_log_probabilities(array)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
