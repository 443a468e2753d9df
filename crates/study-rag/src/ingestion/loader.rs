//! PDF text extraction with page boundaries

use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::IngestionConfig;
use crate::error::{Error, Result};

/// Text of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Cleaned text content; may be empty for image-only pages
    pub content: String,
}

/// Extracted document
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File name inside the folder
    pub filename: String,
    /// SHA-256 of the raw file bytes
    pub content_hash: String,
    /// Pages in order
    pub pages: Vec<PageText>,
}

impl ParsedDocument {
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }
}

/// Loads PDFs through a scratch file that is removed when loading finishes.
///
/// Extraction runs on the blocking pool. A timed-out extraction cannot be
/// cancelled, so each one holds an extraction slot until its thread returns;
/// at most `max_concurrent_extractions` threads are ever busy extracting.
pub struct PdfLoader {
    scratch_dir: Option<PathBuf>,
    timeout: Duration,
    slots: Arc<Semaphore>,
}

impl PdfLoader {
    /// Create a loader from ingestion settings
    pub fn new(config: &IngestionConfig) -> Self {
        Self {
            scratch_dir: config.scratch_dir.clone(),
            timeout: Duration::from_secs(config.extract_timeout_secs),
            slots: Arc::new(Semaphore::new(config.max_concurrent_extractions.max(1))),
        }
    }

    /// Extract per-page text from PDF bytes.
    ///
    /// The bytes are spooled to a temporary file for the extractor. The file
    /// is owned by this call and deleted on return, whether extraction
    /// succeeded, failed or timed out.
    pub async fn load(&self, filename: &str, data: Bytes) -> Result<ParsedDocument> {
        let content_hash = hash_bytes(&data);

        let temp = self.spool(filename, &data)?;
        let path = temp.path().to_path_buf();
        let name = filename.to_string();

        let pages = self
            .run_extraction(filename, move || extract_pages(&path, &name))
            .await?;
        drop(temp);

        Ok(ParsedDocument {
            filename: filename.to_string(),
            content_hash,
            pages,
        })
    }

    /// Run `extract` on the blocking pool under an extraction slot and the timeout.
    ///
    /// Panics inside `extract` become `Error::FileParse` for `filename`.
    async fn run_extraction<T, F>(&self, filename: &str, extract: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = match tokio::time::timeout(self.timeout, Arc::clone(&self.slots).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Error::internal("Extraction slots closed")),
            Err(_) => {
                tracing::error!(
                    "No extraction slot for {} within {:?}; earlier extractions are still running",
                    filename,
                    self.timeout
                );
                return Err(Error::file_parse(filename, "extractor busy, try again later"));
            }
        };

        // The permit moves into the thread so a timed-out extraction keeps its slot
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            std::panic::catch_unwind(AssertUnwindSafe(extract))
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(_))) => {
                tracing::error!("PDF extraction of {} panicked", filename);
                Err(Error::file_parse(filename, "extractor panicked"))
            }
            Ok(Err(e)) => Err(Error::file_parse(filename, format!("extractor crashed: {}", e))),
            Err(_) => {
                tracing::error!("PDF extraction of {} timed out after {:?}", filename, self.timeout);
                Err(Error::file_parse(
                    filename,
                    format!("extraction timed out after {}s", self.timeout.as_secs()),
                ))
            }
        }
    }

    fn spool(&self, filename: &str, data: &[u8]) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("study-rag-").suffix(".pdf");
        let mut temp = match &self.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        temp.write_all(data)?;
        temp.flush()?;
        tracing::debug!("Spooled {} ({} bytes) to {}", filename, data.len(), temp.path().display());
        Ok(temp)
    }
}

/// Extract cleaned page texts from a PDF file.
///
/// Both lopdf and pdf-extract can panic on malformed input; callers run this
/// under `catch_unwind` (see [`PdfLoader::load`]).
pub fn extract_pages(path: &Path, filename: &str) -> Result<Vec<PageText>> {
    let doc = lopdf::Document::load(path).map_err(|e| {
        Error::file_parse(filename, format!("Failed to load PDF: {}", e))
    })?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(Error::file_parse(filename, "PDF has no pages"));
    }

    // pdf-extract panics on some malformed font programs
    let extracted = match std::panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err("extractor panicked".to_string()),
    };

    let raw_pages = match extracted {
        Ok(text) => {
            let split: Vec<String> = text.split('\u{000C}').map(str::to_string).collect();
            if split.len() >= page_numbers.len() {
                split.into_iter().take(page_numbers.len()).collect()
            } else {
                // No reliable page breaks; ask lopdf page by page
                tracing::debug!(
                    "{}: pdf-extract gave {} segments for {} pages, using per-page fallback",
                    filename,
                    split.len(),
                    page_numbers.len()
                );
                let fallback = extract_with_lopdf(&doc, &page_numbers);
                if fallback.iter().any(|p| !p.trim().is_empty()) {
                    fallback
                } else {
                    vec![text]
                }
            }
        }
        Err(e) => {
            tracing::warn!("pdf-extract failed on {}: {}, trying fallback", filename, e);
            extract_with_lopdf(&doc, &page_numbers)
        }
    };

    Ok(raw_pages
        .iter()
        .enumerate()
        .map(|(i, raw)| PageText {
            page_number: i as u32 + 1,
            content: clean_text(raw),
        })
        .collect())
}

fn extract_with_lopdf(doc: &lopdf::Document, page_numbers: &[u32]) -> Vec<String> {
    page_numbers
        .iter()
        .map(|&n| match doc.extract_text(&[n]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Could not extract text from page {}: {}", n, e);
                String::new()
            }
        })
        .collect()
}

/// Normalize extracted text.
///
/// Replaces typographic ligatures and quotes, strips NULs, trims lines and
/// collapses runs of blank lines into a single paragraph break.
pub fn clean_text(raw: &str) -> String {
    let normalized = raw
        .replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    let mut out = String::with_capacity(normalized.len());
    let mut blank_run = false;
    for line in normalized.lines() {
        let line = line.trim();
        if line.is_empty() {
            blank_run = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank_run = false;
    }
    out
}

/// Hash content for change detection
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_keeps_paragraphs() {
        let raw = "  Title \n\n\n\nFirst line\u{00A0}here\nsecond \u{FB01}ne line\n\n  \nNext para\0";
        assert_eq!(clean_text(raw), "Title\n\nFirst line here\nsecond fine line\n\nNext para");
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text("\n \n\t\n"), "");
    }

    #[tokio::test]
    async fn test_invalid_pdf_fails_and_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let loader = PdfLoader::new(&IngestionConfig {
            extract_timeout_secs: 10,
            scratch_dir: Some(scratch.path().to_path_buf()),
            max_concurrent_extractions: 2,
        });

        let err = loader
            .load("broken.pdf", Bytes::from_static(b"this is not a pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileParse { .. }));

        let leftovers = std::fs::read_dir(scratch.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    fn loader_with(timeout: Duration, slots: usize) -> PdfLoader {
        PdfLoader {
            scratch_dir: None,
            timeout,
            slots: Arc::new(Semaphore::new(slots)),
        }
    }

    #[tokio::test]
    async fn test_panicking_extractor_is_a_parse_error() {
        let loader = loader_with(Duration::from_secs(5), 1);
        let err = loader
            .run_extraction("evil.pdf", || -> Result<Vec<PageText>> { panic!("bad font program") })
            .await
            .unwrap_err();

        match err {
            Error::FileParse { filename, message } => {
                assert_eq!(filename, "evil.pdf");
                assert!(message.contains("panicked"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(loader.slots.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_extraction_keeps_its_slot() {
        let loader = loader_with(Duration::from_millis(50), 1);
        let err = loader
            .run_extraction("slow.pdf", || {
                std::thread::sleep(Duration::from_millis(400));
                Ok(Vec::<PageText>::new())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        // Still running on the blocking pool
        assert_eq!(loader.slots.available_permits(), 0);
        let busy = loader
            .run_extraction("next.pdf", || Ok(Vec::<PageText>::new()))
            .await
            .unwrap_err();
        assert!(busy.to_string().contains("busy"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(loader.slots.available_permits(), 1);
        let pages = loader
            .run_extraction("next.pdf", || Ok(Vec::<PageText>::new()))
            .await
            .unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
