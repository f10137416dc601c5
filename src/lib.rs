use std::path::Path;

use image::DynamicImage;
use log::debug;

use crate::{
    analysis::{
        confidence::{ConfidenceAggregator, ConfidenceMap},
        scores::SymmetryScores,
    },
    error::{ForensicsError, Result},
    image_utils::{PreparedImage, image_to_tensor},
    inference::BlockScorer,
    report::visualization::{Figures, Visualizer},
};

pub mod analysis;
pub mod error;
pub mod image_utils;
pub mod inference;
pub mod report;

pub const DEFAULT_MODEL_PATH: &str = "models/pretrained.pt";

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub block_size: u32,
    /// Recompress the input at this JPEG quality before scoring.
    pub jpeg_quality: Option<u8>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            block_size: 32,
            jpeg_quality: None,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(ForensicsError::InvalidBlockSize(self.block_size));
        }

        if let Some(quality) = self.jpeg_quality {
            if !(1..=100).contains(&quality) {
                return Err(ForensicsError::InvalidParameter(format!(
                    "JPEG quality must be within 1..=100, got {}",
                    quality
                )));
            }
        }

        Ok(())
    }
}

pub struct ForgeryDetector {
    original: DynamicImage,
    config: DetectionConfig,
    path: Option<String>,
}

impl ForgeryDetector {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let original = image::open(&path)?;

        Ok(Self {
            original,
            config: DetectionConfig::default(),
            path: Some(path_str),
        })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            original: image,
            config: DetectionConfig::default(),
            path: None,
        }
    }

    pub fn with_config(mut self, config: DetectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn prepare(&self) -> Result<PreparedImage> {
        self.config.validate()?;

        let mut prepared = PreparedImage::new(&self.original);
        let (width, height) = prepared.dimensions();

        if width < self.config.block_size || height < self.config.block_size {
            return Err(ForensicsError::ImageTooSmall(self.config.block_size));
        }

        if let Some(quality) = self.config.jpeg_quality {
            debug!("recompressing input at JPEG quality {}", quality);
            prepared.jpeg_compress(quality)?;
        }

        Ok(prepared)
    }

    pub fn detect(&self, scorer: &mut dyn BlockScorer) -> Result<DetectionReport> {
        let image = self.prepare()?;
        let tensor = image_to_tensor(&image.pixels);

        debug!(
            "scoring {}x{} image with '{}' at block size {}",
            image.pixels.width(),
            image.pixels.height(),
            scorer.name(),
            self.config.block_size
        );

        let scores = scorer.score(&tensor, self.config.block_size)?;
        let confidence = ConfidenceAggregator::new().aggregate_symmetries(&scores)?;

        Ok(DetectionReport {
            input: self.path.clone(),
            scorer: scorer.name().to_string(),
            block_size: self.config.block_size,
            jpeg_quality: self.config.jpeg_quality,
            image,
            scores,
            confidence,
        })
    }
}

#[derive(Debug)]
pub struct DetectionReport {
    pub input: Option<String>,
    pub scorer: String,
    pub block_size: u32,
    pub jpeg_quality: Option<u8>,
    pub image: PreparedImage,
    pub scores: SymmetryScores,
    pub confidence: ConfidenceMap,
}

impl DetectionReport {
    pub fn save_error_map<P: AsRef<Path>>(&self, visualizer: &Visualizer, path: P) -> Result<()> {
        visualizer.save_error_map(
            &self.confidence,
            self.block_size,
            self.image.original_dimensions,
            path,
        )
    }

    pub fn figures(&self, visualizer: &Visualizer) -> Result<Figures> {
        visualizer.figures(&self.image.pixels, &self.confidence, self.block_size)
    }
}
