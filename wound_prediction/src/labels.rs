use serde::{Deserialize, Serialize};
use std::fmt;

/// Categories the classifier was trained on.
///
/// Declaration order is the model's output order: score `i` belongs to
/// `ClassLabel::ALL[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassLabel {
    #[serde(rename = "Abnormal(Ulcer)")]
    AbnormalUlcer,
    #[serde(rename = "Normal(Healthy skin)")]
    NormalHealthySkin,
    #[serde(rename = "Wound Images")]
    WoundImages,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 3] = [
        ClassLabel::AbnormalUlcer,
        ClassLabel::NormalHealthySkin,
        ClassLabel::WoundImages,
    ];

    pub fn count() -> usize {
        Self::ALL.len()
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassLabel::AbnormalUlcer => "Abnormal(Ulcer)",
            ClassLabel::NormalHealthySkin => "Normal(Healthy skin)",
            ClassLabel::WoundImages => "Wound Images",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ClassLabel {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("{} is not a known class label", s))
    }
}
