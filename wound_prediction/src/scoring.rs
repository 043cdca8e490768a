use crate::{error::PredictionError, labels::ClassLabel};
use serde::{Deserialize, Serialize};

/// Raw pre-softmax classifier output, one entry per [`ClassLabel`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub class: ClassLabel,
    /// Probability of `class` as a percentage.
    pub confidence: f64,
}

pub fn softmax(scores: &[f32]) -> Vec<f64> {
    let max = scores
        .iter()
        .map(|&s| s as f64)
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|&s| (s as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn resolve(scores: &ScoreVector) -> Result<ClassificationResult, PredictionError> {
    let scores = scores.as_slice();
    if scores.len() != ClassLabel::count() {
        return Err(PredictionError::Shape(format!(
            "expected {} scores, got {}",
            ClassLabel::count(),
            scores.len()
        )));
    }
    if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
        return Err(PredictionError::Shape(format!(
            "score {} is not finite: {}",
            index, scores[index]
        )));
    }

    let probabilities = softmax(scores);
    tracing::debug!("Raw scores: {:?}, softmax: {:?}", scores, probabilities);

    // Argmax over raw scores, not probabilities. First index wins ties.
    let index = scores
        .iter()
        .enumerate()
        .fold(0, |best, (i, &s)| if s > scores[best] { i } else { best });
    let max_probability = probabilities[index];

    let class = ClassLabel::from_index(index)
        .ok_or_else(|| PredictionError::Shape(format!("no class label at index {}", index)))?;

    Ok(ClassificationResult {
        class,
        confidence: (100.0 * max_probability).clamp(0.0, 100.0),
    })
}
