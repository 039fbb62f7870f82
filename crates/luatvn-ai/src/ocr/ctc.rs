//! Greedy CTC decoding for the line recognizer.

use ndarray::ArrayView2;

/// Recognizer vocabulary: blank at index 0, dictionary entries, then a space.
#[derive(Debug, Clone)]
pub struct CtcDictionary {
    tokens: Vec<String>,
}

impl CtcDictionary {
    /// Build from `dict.txt` contents, one token per line.
    pub fn from_dict_text(raw: &str) -> Self {
        let mut tokens = Vec::with_capacity(raw.lines().count() + 2);
        tokens.push(String::new());
        tokens.extend(
            raw.lines()
                .map(|l| l.trim_end_matches('\r'))
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
        tokens.push(" ".to_string());
        Self { tokens }
    }

    /// Vocabulary size including blank and space.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.len() <= 2
    }

    /// Decode one `[time, classes]` probability matrix.
    ///
    /// Takes the best class per step, collapses repeats, drops blanks.
    /// Confidence is the mean probability of the kept steps, 0 when none.
    pub fn decode(&self, probs: ArrayView2<'_, f32>) -> (String, f32) {
        let mut text = String::new();
        let mut kept = 0usize;
        let mut conf_sum = 0.0f64;
        let mut prev: Option<usize> = None;

        for row in probs.outer_iter() {
            let Some((idx, &p)) = row
                .iter()
                .enumerate()
                .filter(|(_, p)| !p.is_nan())
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
            else {
                prev = None;
                continue;
            };

            let repeated = prev == Some(idx);
            prev = Some(idx);
            if idx == 0 || repeated {
                continue;
            }
            if let Some(token) = self.tokens.get(idx) {
                text.push_str(token);
                conf_sum += f64::from(p);
                kept += 1;
            }
        }

        let confidence = if kept == 0 {
            0.0
        } else {
            (conf_sum / kept as f64) as f32
        };
        (text, confidence)
    }
}
