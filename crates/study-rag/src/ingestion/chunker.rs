//! Recursive text chunking with page and position tracking
//!
//! Page text is split on the coarsest boundary that yields pieces no longer
//! than the chunk size (paragraphs, then lines, then sentences, then single
//! characters). Neighbouring pieces are merged greedily into chunks with a
//! bounded overlap. All positions are byte spans into the page text; all
//! lengths are counted in characters.

use std::collections::VecDeque;

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, ChunkSource};

use super::loader::ParsedDocument;

/// Split boundaries, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Char,
}

impl Boundary {
    fn finer(self) -> Option<Self> {
        match self {
            Boundary::Paragraph => Some(Boundary::Line),
            Boundary::Line => Some(Boundary::Sentence),
            Boundary::Sentence => Some(Boundary::Char),
            Boundary::Char => None,
        }
    }
}

/// Byte span with its length in characters
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Maximum overlap between neighbouring chunks in characters
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker. The overlap is capped below the chunk size.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Chunk every page of a parsed document.
    ///
    /// Chunks never span pages. `chunk_index` runs across the whole document.
    pub fn chunk_document(&self, doc: &ParsedDocument) -> Vec<Chunk> {
        let page_count = doc.page_count();
        let mut chunks = Vec::new();

        for page in &doc.pages {
            for (start, end) in self.split_spans(&page.content) {
                let index = chunks.len() as u32;
                chunks.push(Chunk::new(
                    page.content[start..end].to_string(),
                    ChunkSource::pdf(doc.filename.clone(), page.page_number, page_count),
                    start,
                    end,
                    index,
                ));
            }
        }

        chunks
    }

    /// Split text into trimmed, non-empty chunk spans
    pub fn split_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        if text.trim().is_empty() {
            return spans;
        }
        let whole = Piece {
            start: 0,
            end: text.len(),
            chars: text.chars().count(),
        };
        self.split_recursive(text, whole, Boundary::Paragraph, &mut spans);
        spans
    }

    fn split_recursive(&self, text: &str, span: Piece, boundary: Boundary, out: &mut Vec<(usize, usize)>) {
        let pieces = split_on(text, span, boundary);
        let mut fitting = Vec::new();

        for piece in pieces {
            if piece.chars <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            // Flush what fits so far, then break the oversized piece further
            self.merge(text, &fitting, out);
            fitting.clear();
            match boundary.finer() {
                Some(finer) => self.split_recursive(text, piece, finer, out),
                None => self.merge(text, &[piece], out),
            }
        }
        self.merge(text, &fitting, out);
    }

    /// Greedily merge contiguous pieces, carrying at most `overlap` characters
    /// from the tail of one chunk into the next.
    ///
    /// The window never starts with a blank piece, and every emit drops at
    /// least the piece the emitted chunk starts with, so each chunk starts
    /// strictly after the one before it.
    fn merge(&self, text: &str, pieces: &[Piece], out: &mut Vec<(usize, usize)>) {
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            if total + piece.chars > self.chunk_size && !window.is_empty() {
                emit(text, &window, out);
                if let Some(dropped) = window.pop_front() {
                    total -= dropped.chars;
                }
                while total > self.overlap || (total + piece.chars > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.chars,
                        None => break,
                    }
                }
                while let Some(&front) = window.front() {
                    if !is_blank(text, front) {
                        break;
                    }
                    window.pop_front();
                    total -= front.chars;
                }
            }
            if window.is_empty() && is_blank(text, piece) {
                continue;
            }
            window.push_back(piece);
            total += piece.chars;
        }

        emit(text, &window, out);
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

fn emit(text: &str, window: &VecDeque<Piece>, out: &mut Vec<(usize, usize)>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };
    if let Some(span) = trimmed_span(text, first.start, last.end) {
        if out.last() != Some(&span) {
            out.push(span);
        }
    }
}

fn is_blank(text: &str, piece: Piece) -> bool {
    text[piece.start..piece.end].trim().is_empty()
}

/// Shrink a span to exclude surrounding whitespace; `None` if nothing is left
fn trimmed_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let new_start = start + lead;
    Some((new_start, new_start + trimmed.len()))
}

/// Split a span at a boundary. Separators stay attached to the piece they
/// end, so the pieces tile the span exactly.
fn split_on(text: &str, span: Piece, boundary: Boundary) -> Vec<Piece> {
    let slice = &text[span.start..span.end];
    let mut cuts: Vec<usize> = match boundary {
        Boundary::Paragraph => slice.match_indices("\n\n").map(|(i, s)| i + s.len()).collect(),
        Boundary::Line => slice.match_indices('\n').map(|(i, s)| i + s.len()).collect(),
        Boundary::Sentence => slice
            .split_sentence_bound_indices()
            .map(|(i, s)| i + s.len())
            .collect(),
        Boundary::Char => slice.char_indices().map(|(i, c)| i + c.len_utf8()).collect(),
    };
    if cuts.last() != Some(&slice.len()) {
        cuts.push(slice.len());
    }

    let mut pieces = Vec::with_capacity(cuts.len());
    let mut prev = 0;
    for cut in cuts {
        if cut > prev {
            pieces.push(Piece {
                start: span.start + prev,
                end: span.start + cut,
                chars: slice[prev..cut].chars().count(),
            });
            prev = cut;
        }
    }
    pieces
}
