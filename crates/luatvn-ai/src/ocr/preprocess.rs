//! Image → NCHW tensors for the detector and the line recognizer.

use image::imageops::{self, FilterType};
use image::RgbImage;
use luatvn_core::BBox;
use ndarray::Array4;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Detector input size: long side capped at `limit`, both sides rounded to
/// a multiple of 32 (minimum 32).
pub fn det_input_size(width: u32, height: u32, limit: u32) -> (u32, u32) {
    let long = width.max(height).max(1) as f32;
    let ratio = if long > limit as f32 { limit as f32 / long } else { 1.0 };
    let round32 = |v: u32| -> u32 {
        let scaled = (v as f32 * ratio).round() as u32;
        (((scaled + 16) / 32) * 32).max(32)
    };
    (round32(width), round32(height))
}

/// Resize and normalize for the DB detector: `[1, 3, H, W]`, ImageNet stats.
pub fn det_tensor(image: &RgbImage, limit: u32) -> Array4<f32> {
    let (w, h) = det_input_size(image.width(), image.height(), limit);
    let resized = imageops::resize(image, w, h, FilterType::Triangle);
    to_nchw(&resized, |c, v| (v / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c])
}

/// Recognizer input width for a crop scaled to `height`, capped at `max_width`.
pub fn rec_input_width(width: u32, height: u32, target_height: u32, max_width: u32) -> u32 {
    let aspect = width as f32 / height.max(1) as f32;
    ((target_height as f32 * aspect).ceil() as u32).clamp(8, max_width)
}

/// Resize a line crop for the recognizer: `[1, 3, height, W]` in `[-1, 1]`.
pub fn rec_tensor(crop: &RgbImage, target_height: u32, max_width: u32) -> Array4<f32> {
    let w = rec_input_width(crop.width(), crop.height(), target_height, max_width);
    let resized = imageops::resize(crop, w, target_height, FilterType::Triangle);
    to_nchw(&resized, |_, v| v / 127.5 - 1.0)
}

/// Cut `bbox` out of `image`, clamped to its bounds. `None` if nothing remains.
pub fn crop(image: &RgbImage, bbox: &BBox) -> Option<RgbImage> {
    let left = bbox.left.clamp(0, image.width() as i32) as u32;
    let top = bbox.top.clamp(0, image.height() as i32) as u32;
    let right = bbox.right.clamp(0, image.width() as i32) as u32;
    let bottom = bbox.bottom.clamp(0, image.height() as i32) as u32;
    if right <= left || bottom <= top {
        return None;
    }
    Some(imageops::crop_imm(image, left, top, right - left, bottom - top).to_image())
}

fn to_nchw(image: &RgbImage, norm: impl Fn(usize, f32) -> f32) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut out = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    for (x, y, px) in image.enumerate_pixels() {
        for c in 0..3 {
            out[[0, c, y as usize, x as usize]] = norm(c, px[c] as f32);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn det_size_caps_long_side_and_rounds() {
        assert_eq!(det_input_size(1920, 1080, 960), (960, 544));
        assert_eq!(det_input_size(100, 50, 960), (96, 64));
        assert_eq!(det_input_size(5, 5, 960), (32, 32));
    }

    #[test]
    fn det_tensor_shape_and_normalization() {
        let img = RgbImage::from_pixel(64, 40, Rgb([255, 255, 255]));
        let t = det_tensor(&img, 960);
        assert_eq!(t.shape(), &[1, 3, 32, 64]);
        let expected = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((t[[0, 0, 0, 0]] - expected).abs() < 1e-4);
    }

    #[test]
    fn rec_tensor_keeps_aspect_within_cap() {
        let img = RgbImage::from_pixel(200, 20, Rgb([0, 0, 0]));
        let t = rec_tensor(&img, 48, 960);
        assert_eq!(t.shape(), &[1, 3, 48, 480]);
        assert!((t[[0, 1, 10, 10]] + 1.0).abs() < 1e-6);

        assert_eq!(rec_input_width(10_000, 10, 48, 960), 960);
    }

    #[test]
    fn crop_clamps_to_image() {
        let img = RgbImage::new(50, 30);
        let c = crop(&img, &BBox::new(-5, 10, 80, 20)).unwrap();
        assert_eq!(c.dimensions(), (50, 10));
        assert!(crop(&img, &BBox::new(60, 0, 70, 10)).is_none());
    }
}
