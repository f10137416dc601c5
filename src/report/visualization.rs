use std::{
    path::{Path, PathBuf},
    process::Command,
};

use image::{DynamicImage, GrayImage, Luma, Rgb, Rgb32FImage, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
use log::{info, warn};
use ndarray::Array2;
use rayon::prelude::*;

use crate::{
    analysis::confidence::ConfidenceMap,
    error::{ForensicsError, Result},
    image_utils::{crop_border, crop_to_multiple, to_rgb8, unit_to_u8, upsample_blocks},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Grayscale,
    Viridis,
}

#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    pub color_scheme: ColorScheme,
    /// Pixels trimmed from each side of the input before display.
    pub display_border: u32,
    pub colorbar_width: u32,
    pub padding: u32,
    pub parallel: bool,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            color_scheme: ColorScheme::Grayscale,
            display_border: 4,
            colorbar_width: 24,
            padding: 10,
            parallel: true,
        }
    }
}

const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);
const TICK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const COLORBAR_TICKS: [f64; 6] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

const VIRIDIS: [[f32; 3]; 9] = [
    [68.0, 1.0, 84.0],
    [71.0, 44.0, 122.0],
    [59.0, 81.0, 139.0],
    [44.0, 113.0, 142.0],
    [33.0, 144.0, 141.0],
    [39.0, 173.0, 129.0],
    [92.0, 200.0, 99.0],
    [170.0, 220.0, 50.0],
    [253.0, 231.0, 37.0],
];

pub struct Visualizer {
    config: VisualizationConfig,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            config: VisualizationConfig::default(),
        }
    }

    pub fn with_config(config: VisualizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    /// Error map (`1 - confidence`) tiled by `block_size` onto a zero canvas of
    /// `dimensions`. Blocks falling outside the canvas are cropped.
    pub fn error_map(&self, map: &ConfidenceMap, block_size: u32, dimensions: (u32, u32)) -> DynamicImage {
        let (width, height) = dimensions;
        let tiled = upsample_blocks(&map.error_map(), block_size as usize);
        let (tiled_height, tiled_width) = tiled.dim();

        let value_at = |x: u32, y: u32| -> f64 {
            let (x, y) = (x as usize, y as usize);
            if x < tiled_width && y < tiled_height {
                tiled[[y, x]]
            } else {
                0.0
            }
        };

        match self.config.color_scheme {
            ColorScheme::Grayscale => DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
                Luma([unit_to_u8(value_at(x, y) as f32)])
            })),
            ColorScheme::Viridis => DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
                viridis(value_at(x, y))
            })),
        }
    }

    pub fn save_error_map<P: AsRef<Path>>(
        &self,
        map: &ConfidenceMap,
        block_size: u32,
        dimensions: (u32, u32),
        path: P,
    ) -> Result<()> {
        let path = path.as_ref();
        self.error_map(map, block_size, dimensions).save(path)?;
        info!("error map written to {}", path.display());
        Ok(())
    }

    pub fn display_image(&self, image: &Rgb32FImage, block_size: u32) -> Result<Rgb32FImage> {
        let trimmed = crop_border(image, self.config.display_border);
        let display = crop_to_multiple(&trimmed, block_size);

        if display.width() == 0 || display.height() == 0 {
            return Err(ForensicsError::ImageTooSmall(block_size + 2 * self.config.display_border));
        }

        Ok(display)
    }

    pub fn confidence_heatmap(&self, confidence: &Array2<f64>) -> RgbImage {
        let (height, width) = confidence.dim();
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            viridis(confidence[[y as usize, x as usize]])
        })
    }

    /// Tints the image towards red where confidence is low:
    /// `image * c + red * (1 - c)`.
    pub fn overlay(&self, image: &Rgb32FImage, confidence: &Array2<f64>) -> RgbImage {
        let (rows, cols) = confidence.dim();
        let width = image.width().min(cols as u32);
        let height = image.height().min(rows as u32);
        let mut result = RgbImage::new(width, height);

        if width == 0 || height == 0 {
            return result;
        }

        let paint_row = |(y, row): (usize, &mut [u8])| {
            for (x, out) in row.chunks_exact_mut(3).enumerate() {
                let c = confidence[[y, x]].clamp(0.0, 1.0) as f32;
                let pixel = image.get_pixel(x as u32, y as u32);

                out[0] = unit_to_u8(pixel[0] * c + (1.0 - c));
                out[1] = unit_to_u8(pixel[1] * c);
                out[2] = unit_to_u8(pixel[2] * c);
            }
        };

        let stride = width as usize * 3;
        if self.config.parallel {
            result.par_chunks_mut(stride).enumerate().for_each(paint_row);
        } else {
            result.chunks_mut(stride).enumerate().for_each(paint_row);
        }

        result
    }

    pub fn comparison(&self, image: &RgbImage, heatmap: &RgbImage) -> RgbImage {
        let padding = self.config.padding;
        let bar_width = self.config.colorbar_width;
        let panel_height = image.height().max(heatmap.height());

        let total_width = image.width() + heatmap.width() + bar_width + padding * 4;
        let total_height = panel_height + padding * 2;
        let mut result = RgbImage::from_pixel(total_width, total_height, BACKGROUND);

        let mut x_offset = padding;
        for panel in [image, heatmap] {
            copy_image_to(&mut result, panel, x_offset, padding);
            x_offset += panel.width() + padding;
        }

        self.draw_colorbar(&mut result, x_offset, padding, panel_height);
        result
    }

    fn draw_colorbar(&self, canvas: &mut RgbImage, x: u32, y: u32, height: u32) {
        let width = self.config.colorbar_width;
        if height == 0 {
            return;
        }

        for row in 0..height {
            let value = 1.0 - row as f64 / (height.max(2) - 1) as f64;
            draw_filled_rect_mut(canvas, Rect::at(x as i32, (y + row) as i32).of_size(width, 1), viridis(value));
        }

        let tick_length = (width / 4).max(2);
        for tick in COLORBAR_TICKS {
            let row = ((1.0 - tick) * (height - 1) as f64).round() as u32;
            let tick_y = (y + row).saturating_sub(1) as i32;
            draw_filled_rect_mut(
                canvas,
                Rect::at((x + width) as i32, tick_y).of_size(tick_length, 2),
                TICK_COLOR,
            );
        }
    }

    pub fn figures(&self, image: &Rgb32FImage, map: &ConfidenceMap, block_size: u32) -> Result<Figures> {
        let display = self.display_image(image, block_size)?;
        let confidence = upsample_blocks(map.values(), block_size as usize);

        let heatmap = self.confidence_heatmap(&confidence);
        let comparison = self.comparison(&to_rgb8(&display), &heatmap);
        let overlay = self.overlay(&display, &confidence);

        Ok(Figures { comparison, overlay })
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_image_to(dest: &mut RgbImage, src: &RgbImage, offset_x: u32, offset_y: u32) {
    let (dest_w, dest_h) = dest.dimensions();

    for (x, y, pixel) in src.enumerate_pixels() {
        let (dx, dy) = (offset_x + x, offset_y + y);
        if dx < dest_w && dy < dest_h {
            dest.put_pixel(dx, dy, *pixel);
        }
    }
}

pub fn viridis(t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0) as f32;
    let scaled = t * (VIRIDIS.len() - 1) as f32;
    let lower = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lower as f32;

    let (a, b) = (VIRIDIS[lower], VIRIDIS[lower + 1]);
    let lerp = |i: usize| (a[i] + (b[i] - a[i]) * frac).round() as u8;

    Rgb([lerp(0), lerp(1), lerp(2)])
}

pub struct Figures {
    pub comparison: RgbImage,
    pub overlay: RgbImage,
}

impl Figures {
    pub fn save_all<P: AsRef<Path>>(&self, directory: P, stem: &str) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        let comparison_path = directory.join(format!("{}_detected_forgeries.png", stem));
        let overlay_path = directory.join(format!("{}_overlay.png", stem));

        self.comparison.save(&comparison_path)?;
        self.overlay.save(&overlay_path)?;

        info!("figures written to {}", directory.display());
        Ok(vec![comparison_path, overlay_path])
    }
}

/// Hands `path` to the platform image viewer. Failures are logged only.
pub fn open_in_viewer(path: &Path) {
    let mut command = viewer_command();
    command.arg(path);

    if let Err(e) = command.spawn() {
        warn!("could not open {} in an image viewer: {}", path.display(), e);
    }
}

#[cfg(target_os = "macos")]
fn viewer_command() -> Command {
    Command::new("open")
}

#[cfg(target_os = "windows")]
fn viewer_command() -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn viewer_command() -> Command {
    Command::new("xdg-open")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{confidence::ConfidenceAggregator, scores::GridScores};
    use ndarray::{Array3, array};

    /// 1x2 grid: left block authentic, right block confidence 0.25.
    fn two_block_map() -> ConfidenceMap {
        let mut scores = Array3::from_elem((4, 1, 2), 0.1);
        scores[[1, 0, 0]] = 0.9;
        scores[[0, 0, 1]] = 0.75;
        ConfidenceAggregator::new().aggregate(&GridScores::new(scores).unwrap())
    }

    #[test]
    fn test_error_map_matches_original_size_and_pads_with_zero() {
        let map = two_block_map();
        let image = Visualizer::new().error_map(&map, 8, (20, 11)).to_luma8();

        assert_eq!(image.dimensions(), (20, 11));
        assert_eq!(image.get_pixel(3, 3)[0], 0);
        assert_eq!(image.get_pixel(12, 7)[0], unit_to_u8(0.75));
        assert_eq!(image.get_pixel(17, 3)[0], 0);
        assert_eq!(image.get_pixel(12, 9)[0], 0);
    }

    #[test]
    fn test_error_map_crops_when_grid_exceeds_image() {
        let map = two_block_map();
        let image = Visualizer::new().error_map(&map, 32, (40, 16));
        assert_eq!((image.width(), image.height()), (40, 16));
    }

    #[test]
    fn test_viridis_error_map_is_rgb() {
        let config = VisualizationConfig {
            color_scheme: ColorScheme::Viridis,
            ..Default::default()
        };
        let image = Visualizer::with_config(config).error_map(&two_block_map(), 8, (16, 8));

        let rgb = image.as_rgb8().unwrap();
        assert_eq!(*rgb.get_pixel(0, 0), viridis(0.0));
        assert_eq!(*rgb.get_pixel(15, 7), viridis(0.75));
    }

    #[test]
    fn test_save_error_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.png");

        Visualizer::new()
            .save_error_map(&two_block_map(), 8, (16, 8), &path)
            .unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (16, 8));
    }

    #[test]
    fn test_viridis_endpoints() {
        assert_eq!(viridis(0.0), Rgb([68, 1, 84]));
        assert_eq!(viridis(1.0), Rgb([253, 231, 37]));
        assert_eq!(viridis(-3.0), viridis(0.0));
        assert_eq!(viridis(0.5), Rgb([33, 144, 141]));
    }

    #[test]
    fn test_display_image_trims_border_and_blocks() {
        let visualizer = Visualizer::new();
        let image = Rgb32FImage::new(80, 50);

        let display = visualizer.display_image(&image, 16).unwrap();
        assert_eq!(display.dimensions(), (64, 32));

        let tiny = Rgb32FImage::new(20, 20);
        assert!(matches!(
            visualizer.display_image(&tiny, 16),
            Err(ForensicsError::ImageTooSmall(_))
        ));
    }

    #[test]
    fn test_overlay_keeps_authentic_pixels_and_reddens_forged_ones() {
        let image = Rgb32FImage::from_pixel(4, 2, Rgb([0.2, 0.4, 0.6]));
        let confidence = array![[1.0, 1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 0.0]];

        for parallel in [true, false] {
            let config = VisualizationConfig {
                parallel,
                ..Default::default()
            };
            let overlay = Visualizer::with_config(config).overlay(&image, &confidence);

            assert_eq!(overlay.get_pixel(0, 0), to_rgb8(&image).get_pixel(0, 0));
            assert_eq!(*overlay.get_pixel(3, 1), Rgb([255, 0, 0]));
        }
    }

    #[test]
    fn test_figures_layout() {
        let visualizer = Visualizer::new();
        let image = Rgb32FImage::from_pixel(24, 24, Rgb([0.5, 0.5, 0.5]));
        let map = two_block_map();

        let figures = visualizer.figures(&image, &map, 8).unwrap();
        let config = visualizer.config();

        // display image is 16x16, heat map is 16x8
        assert_eq!(figures.overlay.dimensions(), (16, 8));
        assert_eq!(
            figures.comparison.width(),
            16 + 16 + config.colorbar_width + config.padding * 4
        );
        assert_eq!(figures.comparison.height(), 16 + config.padding * 2);

        let bar_x = config.padding * 3 + 32;
        assert_eq!(*figures.comparison.get_pixel(bar_x, config.padding), viridis(1.0));
    }

    #[test]
    fn test_figures_save_all() {
        let dir = tempfile::tempdir().unwrap();
        let figures = Figures {
            comparison: RgbImage::new(4, 4),
            overlay: RgbImage::new(2, 2),
        };

        let paths = figures.save_all(dir.path().join("figs"), "photo").unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.exists()));
        assert!(paths[0].ends_with("photo_detected_forgeries.png"));
    }
}
