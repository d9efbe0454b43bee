use image::{Rgb, RgbImage};
use std::path::PathBuf;

use crate::imaging::store::{ImageStore, StoreError};

pub const ENHANCED_PREFIX: &str = "enhanced_";

/// Applies the four enhancement factors and persists the result under the
/// enhanced-images directory. Factors are multipliers: 1.0 leaves the
/// property unchanged, 0.0 removes it entirely, values above 1.0
/// exaggerate it. No clamping is applied to the factors themselves.
#[derive(Clone)]
pub struct Enhancer {
    store: ImageStore,
    enhanced_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to create enhanced image directory: {0}")]
    CreateDir(std::io::Error),
    #[error("failed to write enhanced image {0}: {1}")]
    Write(String, image::ImageError),
}

impl Enhancer {
    pub fn new(store: ImageStore, enhanced_dir: PathBuf) -> Self {
        Self {
            store,
            enhanced_dir,
        }
    }

    pub fn enhanced_path(&self, image_id: &str) -> PathBuf {
        self.enhanced_dir.join(format!("{ENHANCED_PREFIX}{image_id}"))
    }

    /// Runs the enhancement chain and saves the output, returning the new
    /// image identifier. A failed save may leave a partial file behind;
    /// callers must not assume cleanup.
    pub fn transform(
        &self,
        image_id: &str,
        color: f32,
        brightness: f32,
        contrast: f32,
        sharpness: f32,
    ) -> Result<String, EnhanceError> {
        let source = self.store.resolve(image_id)?.to_rgb8();
        let enhanced = enhance(&source, color, brightness, contrast, sharpness);

        std::fs::create_dir_all(&self.enhanced_dir).map_err(EnhanceError::CreateDir)?;
        let enhanced_id = format!("{ENHANCED_PREFIX}{image_id}");
        if let Err(e) = enhanced.save(self.enhanced_dir.join(&enhanced_id)) {
            log::error!("image enhancement failed for {image_id}: {e}");
            return Err(EnhanceError::Write(enhanced_id, e));
        }
        Ok(enhanced_id)
    }
}

/// The four operations compose in a fixed order; they do not commute.
pub fn enhance(
    img: &RgbImage,
    color: f32,
    brightness: f32,
    contrast: f32,
    sharpness: f32,
) -> RgbImage {
    let img = adjust_color(img, color);
    let img = adjust_brightness(&img, brightness);
    let img = adjust_contrast(&img, contrast);
    adjust_sharpness(&img, sharpness)
}

/// Saturation: blends between the grayscale rendition and the original.
pub fn adjust_color(img: &RgbImage, factor: f32) -> RgbImage {
    interpolate(&grayscale(img), img, factor)
}

/// Brightness: blends between black and the original.
pub fn adjust_brightness(img: &RgbImage, factor: f32) -> RgbImage {
    let black = RgbImage::new(img.width(), img.height());
    interpolate(&black, img, factor)
}

/// Contrast: blends between a solid gray at the image's mean luma and the
/// original.
pub fn adjust_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let mean = mean_luma(img);
    let gray = RgbImage::from_pixel(img.width(), img.height(), Rgb([mean, mean, mean]));
    interpolate(&gray, img, factor)
}

/// Sharpness: blends between a 3x3-smoothed rendition and the original.
pub fn adjust_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let smooth = image::imageops::filter3x3(
        img,
        &[
            1.0 / 13.0,
            1.0 / 13.0,
            1.0 / 13.0,
            1.0 / 13.0,
            5.0 / 13.0,
            1.0 / 13.0,
            1.0 / 13.0,
            1.0 / 13.0,
            1.0 / 13.0,
        ],
    );
    interpolate(&smooth, img, factor)
}

/// Linear interpolation from the degenerate image towards the original.
/// Factors outside [0, 1] extrapolate; channel values saturate at the
/// u8 range instead of erroring.
fn interpolate(degenerate: &RgbImage, original: &RgbImage, factor: f32) -> RgbImage {
    let mut out = RgbImage::new(original.width(), original.height());
    for (x, y, px) in out.enumerate_pixels_mut() {
        let d = degenerate.get_pixel(x, y);
        let o = original.get_pixel(x, y);
        for c in 0..3 {
            let v = d[c] as f32 + factor * (o[c] as f32 - d[c] as f32);
            px[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

// ITU-R 601-2 luma weights.
fn luma(px: &Rgb<u8>) -> u8 {
    let l = (299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32 + 500) / 1000;
    l.min(255) as u8
}

fn grayscale(img: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(img.width(), img.height());
    for (x, y, px) in out.enumerate_pixels_mut() {
        let l = luma(img.get_pixel(x, y));
        *px = Rgb([l, l, l]);
    }
    out
}

fn mean_luma(img: &RgbImage) -> u8 {
    let pixels = (img.width() * img.height()) as u64;
    if pixels == 0 {
        return 0;
    }
    let sum: u64 = img.pixels().map(|px| luma(px) as u64).sum();
    ((sum as f64 / pixels as f64) + 0.5) as u8
}
