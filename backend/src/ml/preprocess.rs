use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use tch::Tensor;

pub const INPUT_SIZE: u32 = 224;
pub const RESIZE_SHORTEST: u32 = 256;
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Canonical ImageNet evaluation pipeline: shortest side scaled to 256,
/// center crop to 224x224, per-channel mean/std normalization, batched
/// NCHW float tensor.
pub fn to_input_tensor(img: &DynamicImage) -> Tensor {
    let rgb = resize_and_crop(img);
    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = (y * INPUT_SIZE + x) as usize;
        for c in 0..3 {
            data[idx + plane * c] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }
    Tensor::from_slice(&data).view([1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64])
}

pub fn resize_and_crop(img: &DynamicImage) -> RgbImage {
    let (w, h) = (img.width().max(1), img.height().max(1));
    let (nw, nh) = if w <= h {
        (
            RESIZE_SHORTEST,
            ((h as f32 * RESIZE_SHORTEST as f32 / w as f32).round() as u32).max(RESIZE_SHORTEST),
        )
    } else {
        (
            ((w as f32 * RESIZE_SHORTEST as f32 / h as f32).round() as u32).max(RESIZE_SHORTEST),
            RESIZE_SHORTEST,
        )
    };
    let resized = img.resize_exact(nw, nh, FilterType::Triangle).to_rgb8();
    let x = (nw - INPUT_SIZE) / 2;
    let y = (nh - INPUT_SIZE) / 2;
    image::imageops::crop_imm(&resized, x, y, INPUT_SIZE, INPUT_SIZE).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_images_crop_to_square() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let out = resize_and_crop(&img);
        assert_eq!((out.width(), out.height()), (INPUT_SIZE, INPUT_SIZE));
    }

    #[test]
    fn tall_and_tiny_images_crop_to_square() {
        for (w, h) in [(480, 640), (32, 48), (300, 300)] {
            let img = DynamicImage::ImageRgb8(RgbImage::new(w, h));
            let out = resize_and_crop(&img);
            assert_eq!((out.width(), out.height()), (INPUT_SIZE, INPUT_SIZE));
        }
    }

    #[test]
    fn input_tensor_is_batched_nchw() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(256, 256));
        let tensor = to_input_tensor(&img);
        assert_eq!(tensor.size(), [1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64]);
    }
}
