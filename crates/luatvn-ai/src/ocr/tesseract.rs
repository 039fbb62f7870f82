//! Traditional OCR through the native Tesseract API (`tesseract-rs`).
//!
//! The decoded image is handed to Tesseract as raw RGB. Tesseract's TSV
//! rendering of the recognized page is then grouped back into lines.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use luatvn_core::{BBox, OcrLine};
use tesseract_rs::TesseractAPI;
use tracing::{debug, info};

use super::OcrEngine;

/// Searched in order when no tessdata directory is configured.
const TESSDATA_CANDIDATES: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

pub struct TesseractEngine {
    tessdata: Option<PathBuf>,
    langs: String,
}

impl TesseractEngine {
    /// `languages` are short codes (`vi`, `en`) or Tesseract codes (`vie`).
    /// `tessdata` is the directory holding `<lang>.traineddata`.
    pub fn new(tessdata: Option<PathBuf>, languages: &[String]) -> Self {
        Self {
            tessdata,
            langs: tesseract_langs(languages),
        }
    }

    /// Resolve the tessdata directory and check every language is installed.
    pub fn init(mut self) -> anyhow::Result<Self> {
        let dir = match self.tessdata.take() {
            Some(dir) => dir,
            None => TESSDATA_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .find(|p| p.is_dir())
                .ok_or_else(|| anyhow::anyhow!("no tessdata directory found; set TESSDATA_PREFIX"))?,
        };
        for lang in self.langs.split('+') {
            let data = dir.join(format!("{lang}.traineddata"));
            anyhow::ensure!(data.is_file(), "missing {}", data.display());
        }
        // Loads the language models once so a broken install fails at startup.
        self.api(&dir)?;
        info!(tessdata = %dir.display(), langs = %self.langs, "tesseract available");
        self.tessdata = Some(dir);
        Ok(self)
    }

    fn api(&self, dir: &Path) -> anyhow::Result<TesseractAPI> {
        let api = TesseractAPI::new();
        api.init(dir, &self.langs)
            .map_err(|e| anyhow::anyhow!("tesseract init ({}): {e}", self.langs))?;
        Ok(api)
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<Vec<OcrLine>> {
        let dir = self
            .tessdata
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("tesseract engine used before init"))?;
        let rgb = image.to_rgb8();
        let width = i32::try_from(rgb.width())?;
        let height = i32::try_from(rgb.height())?;

        // One handle per call: a TessBaseAPI is not safe to share across threads.
        let api = self.api(dir)?;
        api.set_image(rgb.as_raw(), width, height, 3, 3 * width)
            .map_err(|e| anyhow::anyhow!("tesseract set_image: {e}"))?;
        let tsv = api
            .get_tsv_text(0)
            .map_err(|e| anyhow::anyhow!("tesseract recognize: {e}"))?;

        let lines = parse_tsv(&tsv);
        debug!(lines = lines.len(), "tesseract lines parsed");
        Ok(lines)
    }
}

/// Map short language codes to Tesseract's and join with `+`.
pub fn tesseract_langs(languages: &[String]) -> String {
    let mapped: Vec<&str> = languages
        .iter()
        .map(|l| match l.as_str() {
            "vi" => "vie",
            "en" => "eng",
            other => other,
        })
        .collect();
    if mapped.is_empty() {
        "eng".to_string()
    } else {
        mapped.join("+")
    }
}

#[derive(Default)]
struct LineAcc {
    words: Vec<String>,
    conf_sum: f64,
    bbox: Option<BBox>,
}

/// Group TSV word rows (level 5, positive confidence) into lines.
fn parse_tsv(tsv: &str) -> Vec<OcrLine> {
    let mut groups: BTreeMap<(u32, u32, u32, u32), LineAcc> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        let Ok(conf) = cols[10].trim().parse::<f32>() else {
            continue;
        };
        if conf <= 0.0 || text.is_empty() {
            continue;
        }
        let nums: Option<Vec<i32>> = cols[1..10].iter().map(|c| c.trim().parse().ok()).collect();
        let Some(n) = nums else { continue };

        let key = (n[0] as u32, n[1] as u32, n[2] as u32, n[3] as u32);
        let word_box = BBox::from_xywh(n[5], n[6], n[7], n[8]);

        let acc = groups.entry(key).or_default();
        acc.words.push(text.to_string());
        acc.conf_sum += f64::from(conf);
        acc.bbox = Some(match acc.bbox {
            Some(b) => b.union(&word_box),
            None => word_box,
        });
    }

    groups
        .into_values()
        .filter_map(|acc| {
            let bbox = acc.bbox?;
            let confidence = (acc.conf_sum / acc.words.len() as f64 / 100.0) as f32;
            Some(OcrLine {
                text: acc.words.join(" "),
                confidence,
                bbox,
            })
        })
        .collect()
}
