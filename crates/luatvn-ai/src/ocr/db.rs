//! Differentiable-binarization (DB) detector postprocessing.
//!
//! Turns the detector's per-pixel text probability map into scored,
//! axis-aligned line boxes in source-image coordinates.

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use luatvn_core::BBox;
use ndarray::ArrayView2;

#[derive(Debug, Clone, Copy)]
pub struct DbParams {
    /// Pixels above this probability are text.
    pub thresh: f32,
    /// Candidate boxes with a lower mean probability are dropped.
    pub box_thresh: f32,
    /// Expansion applied to the shrunk text kernel.
    pub unclip_ratio: f32,
    /// Boxes with a shorter side (in map pixels) are dropped.
    pub min_size: f32,
    pub max_candidates: usize,
}

impl Default for DbParams {
    fn default() -> Self {
        Self {
            thresh: 0.3,
            box_thresh: 0.6,
            unclip_ratio: 1.5,
            min_size: 3.0,
            max_candidates: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub bbox: BBox,
    pub score: f32,
}

/// Extract text boxes from a `[height, width]` probability map.
///
/// `dest_width`/`dest_height` are the source image dimensions the boxes are
/// scaled back to.
pub fn boxes_from_prob_map(
    pred: ArrayView2<'_, f32>,
    dest_width: u32,
    dest_height: u32,
    params: &DbParams,
) -> Vec<TextBox> {
    let (height, width) = pred.dim();
    if height == 0 || width == 0 {
        return Vec::new();
    }

    let bitmap = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        if pred[[y as usize, x as usize]] > params.thresh {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let x_scale = dest_width as f32 / width as f32;
    let y_scale = dest_height as f32 / height as f32;

    let mut boxes = Vec::new();
    let outer = find_contours::<i32>(&bitmap)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .take(params.max_candidates);

    for contour in outer {
        let Some((min_x, min_y, max_x, max_y)) = extent(contour.points.iter().map(|p| (p.x, p.y)))
        else {
            continue;
        };
        let w = (max_x - min_x + 1) as f32;
        let h = (max_y - min_y + 1) as f32;
        if w.min(h) < params.min_size {
            continue;
        }

        let score = mean_score(&pred, min_x as usize, min_y as usize, max_x as usize, max_y as usize);
        if score < params.box_thresh {
            continue;
        }

        // DB predicts a shrunk kernel; grow it back by area * ratio / perimeter.
        let distance = w * h * params.unclip_ratio / (2.0 * (w + h));
        let left = min_x as f32 - distance;
        let top = min_y as f32 - distance;
        let right = (max_x + 1) as f32 + distance;
        let bottom = (max_y + 1) as f32 + distance;
        if (right - left).min(bottom - top) < params.min_size + 2.0 {
            continue;
        }

        let bbox = BBox::new(
            scale(left, x_scale, dest_width),
            scale(top, y_scale, dest_height),
            scale(right, x_scale, dest_width),
            scale(bottom, y_scale, dest_height),
        );
        if bbox.is_well_formed() {
            boxes.push(TextBox { bbox, score });
        }
    }
    boxes
}

fn extent(points: impl Iterator<Item = (i32, i32)>) -> Option<(i32, i32, i32, i32)> {
    points.fold(None, |acc, (x, y)| match acc {
        None => Some((x, y, x, y)),
        Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
    })
}

/// Mean probability inside the inclusive rectangle.
fn mean_score(pred: &ArrayView2<'_, f32>, x0: usize, y0: usize, x1: usize, y1: usize) -> f32 {
    let region = pred.slice(ndarray::s![y0..=y1, x0..=x1]);
    region.mean().unwrap_or(0.0)
}

fn scale(v: f32, factor: f32, limit: u32) -> i32 {
    (v * factor).round().clamp(0.0, limit as f32) as i32
}
