//! Deep-learning OCR: PaddleOCR DB detector + CRNN recognizer on ONNX Runtime.
//!
//! Model directory layout: `det.onnx`, `rec.onnx`, `dict.txt`.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use image::DynamicImage;
use luatvn_core::OcrLine;
use ndarray::{Array4, ArrayView2};
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info, trace};

use super::OcrEngine;
use super::ctc::CtcDictionary;
use super::db::{DbParams, boxes_from_prob_map};
use super::preprocess;

const DET_LIMIT_SIDE: u32 = 960;
const REC_HEIGHT: u32 = 48;
const REC_MAX_WIDTH: u32 = 960;

pub struct PaddleEngine {
    det: Mutex<Session>,
    rec: Mutex<Session>,
    dict: CtcDictionary,
    params: DbParams,
}

impl PaddleEngine {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let det_path = model_dir.join("det.onnx");
        let rec_path = model_dir.join("rec.onnx");
        let dict_path = model_dir.join("dict.txt");
        for path in [&det_path, &rec_path, &dict_path] {
            anyhow::ensure!(path.exists(), "{path:?} not found");
        }

        let det = Session::builder()?
            .commit_from_file(&det_path)
            .with_context(|| format!("create detector session from {det_path:?}"))?;
        let rec = Session::builder()?
            .commit_from_file(&rec_path)
            .with_context(|| format!("create recognizer session from {rec_path:?}"))?;

        let raw = std::fs::read_to_string(&dict_path)
            .with_context(|| format!("read {dict_path:?}"))?;
        let dict = CtcDictionary::from_dict_text(&raw);
        anyhow::ensure!(!dict.is_empty(), "{dict_path:?} has no entries");

        info!(
            dir = %model_dir.display(),
            vocab = dict.len(),
            "loaded PaddleOCR detector and recognizer"
        );
        Ok(Self {
            det: Mutex::new(det),
            rec: Mutex::new(rec),
            dict,
            params: DbParams::default(),
        })
    }

    fn run_single(session: &Mutex<Session>, input: Array4<f32>) -> anyhow::Result<(Vec<usize>, Vec<f32>)> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data = input.into_raw_vec_and_offset().0;
        let tensor = Tensor::from_array((shape, data.into_boxed_slice()))?;

        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session.run(ort::inputs![tensor])?;
        let (out_shape, out_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims = out_shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((dims, out_data.to_vec()))
    }
}

impl OcrEngine for PaddleEngine {
    fn name(&self) -> &str {
        "paddleocr"
    }

    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<Vec<OcrLine>> {
        let rgb = image.to_rgb8();

        // Detector output: [1, 1, H, W] text probability map.
        let (dims, probs) = Self::run_single(&self.det, preprocess::det_tensor(&rgb, DET_LIMIT_SIDE))?;
        anyhow::ensure!(dims.len() == 4, "unexpected detector output shape {dims:?}");
        let map = ArrayView2::from_shape((dims[2], dims[3]), &probs)
            .context("detector output is not a probability map")?;
        let boxes = boxes_from_prob_map(map, rgb.width(), rgb.height(), &self.params);
        debug!(regions = boxes.len(), "text regions detected");

        let mut lines = Vec::with_capacity(boxes.len());
        for text_box in boxes {
            let Some(crop) = preprocess::crop(&rgb, &text_box.bbox) else {
                continue;
            };

            // Recognizer output: [1, T, vocab] per-step class probabilities.
            let (dims, steps) =
                Self::run_single(&self.rec, preprocess::rec_tensor(&crop, REC_HEIGHT, REC_MAX_WIDTH))?;
            anyhow::ensure!(
                dims.len() == 3 && dims[2] == self.dict.len(),
                "recognizer output {dims:?} does not match dictionary size {}",
                self.dict.len()
            );
            let probs = ArrayView2::from_shape((dims[1], dims[2]), &steps)?;
            let (text, confidence) = self.dict.decode(probs);
            trace!(
                region_score = text_box.score,
                rec_conf = confidence,
                chars = text.chars().count(),
                "region recognized"
            );
            if text.trim().is_empty() {
                continue;
            }
            lines.push(OcrLine {
                text,
                confidence,
                bbox: text_box.bbox,
            });
        }
        Ok(lines)
    }
}
