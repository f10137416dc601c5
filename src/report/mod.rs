pub mod visualization;

use std::path::Path;

use serde::Serialize;

use crate::{DetectionReport, analysis::confidence::ConfidenceSummary, error::Result};

/// Machine-readable summary of one detection run.
#[derive(Serialize)]
pub struct JsonReport {
    pub input: Option<String>,
    pub model: String,
    pub block_size: u32,
    pub jpeg_quality: Option<u8>,
    pub image: ImageReportSection,
    pub confidence: ConfidenceSummary,
    pub forgery_suspected: bool,
}

#[derive(Serialize)]
pub struct ImageReportSection {
    pub original_width: u32,
    pub original_height: u32,
    pub analysed_width: u32,
    pub analysed_height: u32,
}

impl From<&DetectionReport> for JsonReport {
    fn from(report: &DetectionReport) -> Self {
        let (original_width, original_height) = report.image.original_dimensions;
        let (analysed_width, analysed_height) = report.image.dimensions();
        let confidence = report.confidence.summary();

        Self {
            input: report.input.clone(),
            model: report.scorer.clone(),
            block_size: report.block_size,
            jpeg_quality: report.jpeg_quality,
            image: ImageReportSection {
                original_width,
                original_height,
                analysed_width,
                analysed_height,
            },
            forgery_suspected: confidence.suspicious_blocks > 0,
            confidence,
        }
    }
}

impl JsonReport {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
