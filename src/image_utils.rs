use std::io::Cursor;

use image::{DynamicImage, GrayImage, Luma, Rgb, Rgb32FImage, RgbImage, imageops};
use ndarray::{Array2, Array4};

use crate::error::{ForensicsError, Result};

/// Input image as fed to the scorer: RGB in `[0, 1]`, even width and height.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub pixels: Rgb32FImage,
    /// Size of the decoded image before any cropping.
    pub original_dimensions: (u32, u32),
}

impl PreparedImage {
    pub fn new(image: &DynamicImage) -> Self {
        let original_dimensions = (image.width(), image.height());
        let rgb = image.to_rgb32f();
        let (width, height) = rgb.dimensions();

        let pixels = imageops::crop_imm(&rgb, 0, 0, width - width % 2, height - height % 2).to_image();

        Self {
            pixels,
            original_dimensions,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn jpeg_compress(&mut self, quality: u8) -> Result<()> {
        self.pixels = jpeg_compress(&self.pixels, quality)?;
        Ok(())
    }
}

pub fn unit_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub fn to_rgb8(image: &Rgb32FImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut result = RgbImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        result.put_pixel(
            x,
            y,
            Rgb([unit_to_u8(pixel[0]), unit_to_u8(pixel[1]), unit_to_u8(pixel[2])]),
        );
    }

    result
}

pub fn jpeg_compress(image: &Rgb32FImage, quality: u8) -> Result<Rgb32FImage> {
    if !(1..=100).contains(&quality) {
        return Err(ForensicsError::InvalidParameter(format!(
            "JPEG quality must be within 1..=100, got {}",
            quality
        )));
    }

    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(to_rgb8(image)).write_with_encoder(encoder)?;

    let recompressed = image::load_from_memory(&buffer.into_inner())?;
    Ok(recompressed.to_rgb32f())
}

pub fn image_to_tensor(image: &Rgb32FImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = pixel[channel];
        }
    }

    tensor
}

pub fn crop_border(image: &Rgb32FImage, border: u32) -> Rgb32FImage {
    let (width, height) = image.dimensions();
    let inner_width = width.saturating_sub(2 * border);
    let inner_height = height.saturating_sub(2 * border);

    imageops::crop_imm(image, border, border, inner_width, inner_height).to_image()
}

pub fn crop_to_multiple(image: &Rgb32FImage, block_size: u32) -> Rgb32FImage {
    let (width, height) = image.dimensions();
    imageops::crop_imm(image, 0, 0, width - width % block_size, height - height % block_size).to_image()
}

pub fn upsample_blocks(arr: &Array2<f64>, block_size: usize) -> Array2<f64> {
    let (rows, cols) = arr.dim();
    Array2::from_shape_fn((rows * block_size, cols * block_size), |(y, x)| {
        arr[[y / block_size, x / block_size]]
    })
}

pub fn array_to_gray(arr: &Array2<f64>) -> GrayImage {
    let (height, width) = arr.dim();
    let mut image = GrayImage::new(width as u32, height as u32);

    for y in 0..height {
        for x in 0..width {
            image.put_pixel(x as u32, y as u32, Luma([unit_to_u8(arr[[y, x]] as f32)]));
        }
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use ndarray::array;

    fn gradient(width: u32, height: u32) -> Rgb32FImage {
        Rgb32FImage::from_fn(width, height, |x, y| {
            Rgb([x as f32 / width as f32, y as f32 / height as f32, 0.5])
        })
    }

    #[test]
    fn test_prepared_image_crops_to_even_and_drops_alpha() {
        let rgba = RgbaImage::from_pixel(33, 17, Rgba([255, 0, 0, 10]));
        let prepared = PreparedImage::new(&DynamicImage::ImageRgba8(rgba));

        assert_eq!(prepared.original_dimensions, (33, 17));
        assert_eq!(prepared.dimensions(), (32, 16));
        assert_eq!(prepared.pixels.get_pixel(0, 0), &Rgb([1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_jpeg_compress_keeps_size_and_validates_quality() {
        let image = gradient(24, 16);
        let compressed = jpeg_compress(&image, 75).unwrap();
        assert_eq!(compressed.dimensions(), (24, 16));

        assert!(matches!(
            jpeg_compress(&image, 0),
            Err(ForensicsError::InvalidParameter(_))
        ));
        assert!(jpeg_compress(&image, 101).is_err());
    }

    #[test]
    fn test_image_to_tensor_is_planar() {
        let image = gradient(4, 2);
        let tensor = image_to_tensor(&image);

        assert_eq!(tensor.dim(), (1, 3, 2, 4));
        assert_eq!(tensor[[0, 0, 1, 3]], 0.75);
        assert_eq!(tensor[[0, 1, 1, 3]], 0.5);
        assert_eq!(tensor[[0, 2, 0, 0]], 0.5);
    }

    #[test]
    fn test_crops() {
        let image = gradient(50, 40);
        assert_eq!(crop_border(&image, 4).dimensions(), (42, 32));
        assert_eq!(crop_border(&image, 30).dimensions(), (0, 0));
        assert_eq!(crop_to_multiple(&image, 16).dimensions(), (48, 32));
    }

    #[test]
    fn test_upsample_blocks() {
        let arr = array![[0.0, 1.0], [0.5, 0.25]];
        let up = upsample_blocks(&arr, 3);

        assert_eq!(up.dim(), (6, 6));
        assert_eq!(up[[2, 2]], 0.0);
        assert_eq!(up[[0, 3]], 1.0);
        assert_eq!(up[[5, 0]], 0.5);
        assert_eq!(up[[5, 5]], 0.25);
    }

    #[test]
    fn test_array_to_gray() {
        let gray = array_to_gray(&array![[0.0, 1.0, 1.5]]);
        assert_eq!(gray.dimensions(), (3, 1));
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(1, 0)[0], 255);
        assert_eq!(gray.get_pixel(2, 0)[0], 255);
    }
}
