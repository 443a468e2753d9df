//! Study artifact types: multiple-choice questions and exam papers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest quiz that may be requested
pub const MIN_MCQ_COUNT: usize = 5;
/// Largest quiz that may be requested
pub const MAX_MCQ_COUNT: usize = 15;
/// Options per multiple-choice question
pub const MCQ_OPTION_COUNT: usize = 4;

/// Check a requested quiz size
pub fn validate_mcq_count(count: usize) -> Result<()> {
    if (MIN_MCQ_COUNT..=MAX_MCQ_COUNT).contains(&count) {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "num_questions must be between {} and {}, got {}",
            MIN_MCQ_COUNT, MAX_MCQ_COUNT, count
        )))
    }
}

/// A multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mcq {
    pub question: String,
    /// Exactly four options
    pub options: Vec<String>,
    /// Zero-based index into `options`
    pub correct_answer: usize,
    pub explanation: String,
}

/// One section of an exam paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaperSection {
    pub name: &'static str,
    pub kind: &'static str,
    pub questions: u32,
    pub marks_each: u32,
}

impl PaperSection {
    pub fn total_marks(&self) -> u32 {
        self.questions * self.marks_each
    }
}

const SHORT_PAPER: &[PaperSection] = &[
    PaperSection { name: "Section A", kind: "Multiple Choice Questions", questions: 5, marks_each: 1 },
    PaperSection { name: "Section B", kind: "Short Answer Questions", questions: 3, marks_each: 5 },
];

const FULL_PAPER: &[PaperSection] = &[
    PaperSection { name: "Section A", kind: "Multiple Choice Questions", questions: 10, marks_each: 1 },
    PaperSection { name: "Section B", kind: "Short Answer Questions", questions: 5, marks_each: 4 },
    PaperSection { name: "Section C", kind: "Long Answer Questions", questions: 3, marks_each: 10 },
];

/// Fixed exam paper layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperPreset {
    /// 20 marks, 45 minutes
    Short,
    /// 60 marks, 2 hours
    Full,
}

impl PaperPreset {
    /// Resolve a preset from its total marks (20 or 60)
    pub fn from_marks(marks: u32) -> Result<Self> {
        match marks {
            20 => Ok(Self::Short),
            60 => Ok(Self::Full),
            other => Err(Error::invalid_input(format!(
                "marks must be 20 or 60, got {}",
                other
            ))),
        }
    }

    pub fn marks(self) -> u32 {
        match self {
            Self::Short => 20,
            Self::Full => 60,
        }
    }

    pub fn duration_minutes(self) -> u32 {
        match self {
            Self::Short => 45,
            Self::Full => 120,
        }
    }

    pub fn sections(self) -> &'static [PaperSection] {
        match self {
            Self::Short => SHORT_PAPER,
            Self::Full => FULL_PAPER,
        }
    }

    /// Size of the diversity-aware candidate pool
    pub fn candidate_count(self) -> usize {
        match self {
            Self::Short => 12,
            Self::Full => 24,
        }
    }

    /// Human-readable duration, e.g. "45 minutes" or "2 hours"
    pub fn duration_label(self) -> String {
        let minutes = self.duration_minutes();
        if minutes % 60 == 0 {
            let hours = minutes / 60;
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        } else {
            format!("{} minutes", minutes)
        }
    }
}

/// Sidecar record stored next to each generated paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub folder: String,
    pub marks: u32,
    pub filename: String,
    pub duration_minutes: u32,
    pub created_at: DateTime<Utc>,
}

/// A freshly generated paper
#[derive(Debug, Clone, Serialize)]
pub struct PaperArtifact {
    pub path: String,
    pub url: String,
    #[serde(flatten)]
    pub metadata: PaperMetadata,
}

/// Listing entry for a previously generated paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperSummary {
    pub filename: String,
    pub folder: String,
    pub marks: u32,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}
