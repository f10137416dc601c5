//! detect-forgeries - block-grid forgery detection from the command line
//!
//! Scores an image with a pretrained grid detector and either writes the
//! error map (`--out`) or renders the diagnostic figures.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use grid_forensics::{
    DEFAULT_MODEL_PATH, DetectionConfig, ForgeryDetector,
    inference::{load_scorer, precomputed::save_scores},
    report::{
        JsonReport,
        visualization::{ColorScheme, VisualizationConfig, Visualizer, open_in_viewer},
    },
};
use log::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Detect forgeries with a pretrained block-grid detector.
#[derive(Parser, Debug)]
#[command(name = "detect-forgeries")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Model to use for the network (.pt, .onnx, or a .json score dump)
    #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// JPEG compression quality applied before analysis. Default: no compression
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg: Option<u8>,

    /// Block size
    #[arg(short, long, default_value_t = 32)]
    block_size: u32,

    /// Path to output image. By default the results are shown as figures
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Colour map of the error map written with --out
    #[arg(long, value_enum, default_value_t = Colormap::Gray)]
    colormap: Colormap,

    /// Directory the figures are written to
    #[arg(long)]
    figures_dir: Option<PathBuf>,

    /// Write the figures without opening them
    #[arg(long)]
    no_open: bool,

    /// Write a JSON summary of the run
    #[arg(long)]
    report: Option<PathBuf>,

    /// Save the model's raw output for later replay with --model <dump>.json
    #[arg(long)]
    dump_scores: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Image to analyse
    input: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Colormap {
    Gray,
    Viridis,
}

impl From<Colormap> for ColorScheme {
    fn from(colormap: Colormap) -> Self {
        match colormap {
            Colormap::Gray => ColorScheme::Grayscale,
            Colormap::Viridis => ColorScheme::Viridis,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DetectionConfig {
        block_size: cli.block_size,
        jpeg_quality: cli.jpeg,
    };

    let mut scorer = load_scorer(&cli.model)
        .with_context(|| format!("loading model {}", cli.model.display()))?;

    let detector = ForgeryDetector::new(&cli.input)
        .with_context(|| format!("opening {}", cli.input.display()))?
        .with_config(config);
    let report = detector.detect(scorer.as_mut())?;

    let summary = report.confidence.summary();
    info!(
        "{}x{} blocks, best grid {}, {} suspicious block(s), minimum confidence {:.3}",
        summary.rows, summary.cols, summary.best_grid, summary.suspicious_blocks, summary.min_confidence
    );

    if let Some(path) = &cli.dump_scores {
        save_scores(&report.scores, path)
            .with_context(|| format!("writing score dump {}", path.display()))?;
    }

    if let Some(path) = &cli.report {
        JsonReport::from(&report)
            .save(path)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    let visualizer = Visualizer::with_config(VisualizationConfig {
        color_scheme: cli.colormap.into(),
        ..Default::default()
    });

    match &cli.out {
        Some(out) => report
            .save_error_map(&visualizer, out)
            .with_context(|| format!("writing error map {}", out.display()))?,
        None => {
            let directory = cli
                .figures_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("detect-forgeries"));
            let stem = cli
                .input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("input");

            let paths = report.figures(&visualizer)?.save_all(&directory, stem)?;
            if !cli.no_open {
                for path in &paths {
                    open_in_viewer(path);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["detect-forgeries", "photo.jpg"]).unwrap();

        assert_eq!(cli.model, PathBuf::from("models/pretrained.pt"));
        assert_eq!(cli.jpeg, None);
        assert_eq!(cli.block_size, 32);
        assert_eq!(cli.out, None);
        assert_eq!(cli.colormap, Colormap::Gray);
        assert_eq!(cli.input, PathBuf::from("photo.jpg"));
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "detect-forgeries", "-m", "net.onnx", "-j", "90", "-b", "64", "-o", "map.png", "in.png",
        ])
        .unwrap();

        assert_eq!(cli.model, PathBuf::from("net.onnx"));
        assert_eq!(cli.jpeg, Some(90));
        assert_eq!(cli.block_size, 64);
        assert_eq!(cli.out, Some(PathBuf::from("map.png")));
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        assert!(Cli::try_parse_from(["detect-forgeries", "-j", "0", "in.png"]).is_err());
        assert!(Cli::try_parse_from(["detect-forgeries", "-j", "101", "in.png"]).is_err());
    }
}
