//! Prompt templates for grounded answers, quizzes and exam papers

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::study::{PaperPreset, MCQ_OPTION_COUNT};
use crate::types::ScoredChunk;

static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<think>.*?</think>").unwrap()
});

/// Passages that made it into a prompt
#[derive(Debug, Clone)]
pub struct PromptContext {
    /// Rendered passages
    pub text: String,
    /// How many retrieved passages were included (possibly the first truncated)
    pub used: usize,
}

/// Prompt builder for study RAG requests
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render passages as numbered, labelled blocks within `max_chars`.
    ///
    /// A passage that does not fit is dropped, except the first, which is
    /// cut at a character boundary so there is always some context.
    pub fn build_context(passages: &[ScoredChunk], max_chars: usize) -> PromptContext {
        let mut text = String::new();
        let mut used_chars = 0usize;
        let mut used = 0usize;

        for (i, passage) in passages.iter().enumerate() {
            let block = format!(
                "[{}] [{}]\n{}\n\n",
                i + 1,
                passage.chunk.source.label(),
                passage.chunk.content
            );
            let block_chars = block.chars().count();

            if used_chars + block_chars <= max_chars {
                text.push_str(&block);
                used_chars += block_chars;
                used += 1;
            } else if i == 0 {
                text.extend(block.chars().take(max_chars));
                used = 1;
                break;
            } else {
                break;
            }
        }

        PromptContext { text, used }
    }

    /// Grounded question-answering prompt
    pub fn chat_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are a study assistant that answers ONLY from the provided document passages.

RULES:
1. Use only information stated in the CONTEXT below
2. If the context does not contain the answer, say clearly that the provided documents do not cover it
3. Do not use outside knowledge
4. Cite the passages you rely on inline, e.g. [notes.pdf, Page 3]

CONTEXT:
{context}
QUESTION: {question}

Answer:"#,
            context = context,
            question = question.trim()
        )
    }

    /// Prompt requesting exactly `count` MCQs as a JSON array
    pub fn mcq_prompt(count: usize, context: &str) -> String {
        format!(
            r#"You are an exam setter. Using ONLY the study material below, write exactly {count} multiple-choice questions that test understanding of different topics in the material.

Return ONLY a JSON array, with no commentary before or after it. Each element must have this shape:
{{"question": "<question text>", "options": ["<A>", "<B>", "<C>", "<D>"], "correct_answer": <index 0-{last} of the correct option>, "explanation": "<why the answer is correct>"}}

Requirements:
- exactly {options} options per question, exactly one of them correct
- "correct_answer" is a zero-based integer index into "options"
- do not repeat questions

STUDY MATERIAL:
{context}"#,
            count = count,
            options = MCQ_OPTION_COUNT,
            last = MCQ_OPTION_COUNT - 1,
            context = context
        )
    }

    /// Prompt describing the section layout of an exam paper
    pub fn paper_prompt(preset: PaperPreset, folder: &str, context: &str) -> String {
        let sections = preset
            .sections()
            .iter()
            .map(|s| {
                format!(
                    "- {}: {} ({} question{} x {} mark{} = {} marks)",
                    s.name,
                    s.kind,
                    s.questions,
                    if s.questions == 1 { "" } else { "s" },
                    s.marks_each,
                    if s.marks_each == 1 { "" } else { "s" },
                    s.total_marks()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are an exam setter preparing a {marks}-mark question paper on "{folder}" ({duration}).
Base every question ONLY on the study material below and cover as many different topics as possible.

PAPER STRUCTURE:
{sections}

FORMAT:
- Start each section with its heading and marks
- Number questions consecutively within each section
- Multiple choice questions list four options labelled (a) to (d)
- Show the marks for each question in brackets

Write the questions ONLY. Do NOT include an answer key, answers, hints or solutions.

STUDY MATERIAL:
{context}"#,
            marks = preset.marks(),
            folder = folder,
            duration = preset.duration_label(),
            sections = sections,
            context = context
        )
    }
}

/// Remove reasoning-model `<think>...</think>` blocks.
///
/// A dangling `</think>` (opening tag trimmed by the provider) drops
/// everything before it.
pub fn strip_think(text: &str) -> String {
    let without_blocks = THINK_BLOCK.replace_all(text, "");
    let without_blocks: &str = &without_blocks;
    let visible = match without_blocks.rfind("</think>") {
        Some(pos) => &without_blocks[pos + "</think>".len()..],
        None => without_blocks,
    };
    visible.trim().to_string()
}
