//! OCR output types and reading-order assembly.

use serde::{Deserialize, Serialize};

use crate::prediction::PredictionResult;

/// Pixel rectangle `[left, top, right, bottom]` in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build from a left/top origin and a size (Tesseract convention).
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Reorder corners and widen zero-area boxes so `left < right` and
    /// `top < bottom` hold.
    pub fn normalized(self) -> BBox {
        let (left, right) = ordered(self.left, self.right);
        let (top, bottom) = ordered(self.top, self.bottom);
        BBox::new(left, top, right, bottom)
    }

    pub fn is_well_formed(&self) -> bool {
        self.left < self.right && self.top < self.bottom
    }
}

fn ordered(a: i32, b: i32) -> (i32, i32) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == hi { (lo, hi + 1) } else { (lo, hi) }
}

impl From<[i32; 4]> for BBox {
    fn from([left, top, right, bottom]: [i32; 4]) -> Self {
        BBox::new(left, top, right, bottom)
    }
}

impl From<BBox> for [i32; 4] {
    fn from(b: BBox) -> Self {
        [b.left, b.top, b.right, b.bottom]
    }
}

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
    pub bbox: BBox,
}

/// Text extracted from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub lines: Vec<OcrLine>,
    pub average_confidence: f32,
    pub engine: String,
}

impl OcrResult {
    /// Assemble a result from engine lines in any order.
    ///
    /// Lines are sorted top-to-bottom then left-to-right, confidences are
    /// clamped to `[0, 1]`, boxes are normalized, and `text` and
    /// `average_confidence` are recomputed from what remains. Lines whose
    /// text is blank are dropped.
    pub fn assemble(lines: Vec<OcrLine>, engine: impl Into<String>) -> Self {
        let mut lines: Vec<OcrLine> = lines
            .into_iter()
            .filter(|l| !l.text.trim().is_empty())
            .map(|l| OcrLine {
                text: l.text.trim().to_string(),
                confidence: clamp_unit(l.confidence),
                bbox: l.bbox.normalized(),
            })
            .collect();

        // `sort_by_key` is stable, so identical positions keep engine order.
        lines.sort_by_key(|l| (l.bbox.top, l.bbox.left));

        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let average_confidence = average(lines.iter().map(|l| l.confidence));

        Self {
            text,
            lines,
            average_confidence,
            engine: engine.into(),
        }
    }

    /// A result with no recognized lines.
    pub fn empty(engine: impl Into<String>) -> Self {
        Self::assemble(Vec::new(), engine)
    }

    /// True when there is nothing worth classifying.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn average(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

/// OCR output plus the classification of its text, when there was any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    pub ocr_result: OcrResult,
    pub classification: Option<PredictionResult>,
}
