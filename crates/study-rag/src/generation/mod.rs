//! Prompt construction and post-processing of model output

pub mod paper;
pub mod prompt;
pub mod quiz;

pub use paper::{next_paper_timestamp, paper_filename, paper_path, parse_legacy_filename, render_paper, sidecar_path};
pub use prompt::{strip_think, PromptBuilder, PromptContext};
pub use quiz::parse_mcqs;
