use lotr_config::CorpusConfig;
use lotr_models::{Document, SourceMetadata};
use lotr_observability::log_source_ingested;
use std::path::Path;
use std::time::Instant;

use crate::errors::IngestError;

/// Page separator inside extracted text
pub const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// Byte offsets into the page text
    pub start: usize,
    pub end: usize,
}

/// Splits text into chunks of at most `chunk_size` characters.
///
/// Paragraphs are packed together while they fit, carrying trailing
/// paragraphs of up to `chunk_overlap` characters into the next chunk.
/// Paragraphs longer than a chunk fall back to a sliding window that prefers
/// to end on a newline or sentence boundary.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidChunking {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &CorpusConfig) -> Result<Self, IngestError> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut current: Vec<(usize, usize)> = Vec::new();

        for para in paragraphs(text) {
            if char_len(&text[para.0..para.1]) > self.chunk_size {
                self.flush(text, &current, &mut chunks);
                current.clear();
                self.window_chunks(text, para.0, para.1, &mut chunks);
                continue;
            }

            if let Some(first) = current.first() {
                if char_len(&text[first.0..para.1]) > self.chunk_size {
                    self.flush(text, &current, &mut chunks);
                    current = self.overlap_tail(text, &current, para.1);
                }
            }
            current.push(para);
        }

        self.flush(text, &current, &mut chunks);
        chunks
    }

    fn flush(&self, text: &str, paras: &[(usize, usize)], out: &mut Vec<TextChunk>) {
        if let (Some(first), Some(last)) = (paras.first(), paras.last()) {
            push_trimmed(text, first.0, last.1, out);
        }
    }

    /// Trailing paragraphs that fit in the overlap and still leave room for the next one
    fn overlap_tail(&self, text: &str, paras: &[(usize, usize)], next_end: usize) -> Vec<(usize, usize)> {
        let Some(last) = paras.last() else {
            return Vec::new();
        };

        let mut keep = Vec::new();
        for para in paras.iter().rev() {
            let fits_overlap = char_len(&text[para.0..last.1]) <= self.chunk_overlap;
            let fits_chunk = char_len(&text[para.0..next_end]) <= self.chunk_size;
            if !(fits_overlap && fits_chunk) {
                break;
            }
            keep.push(*para);
        }
        keep.reverse();
        keep
    }

    fn window_chunks(&self, text: &str, start_byte: usize, end_byte: usize, out: &mut Vec<TextChunk>) {
        let segment = &text[start_byte..end_byte];
        // bounds[i] is the byte offset of char i; the final entry is the segment length
        let bounds: Vec<usize> = segment
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(segment.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut start = 0;
        while start < total {
            let mut end = (start + self.chunk_size).min(total);

            if end < total {
                if let Some(brk) = find_break_point(&segment[bounds[start]..bounds[end]]) {
                    let brk_chars = char_len(&segment[bounds[start]..bounds[start] + brk]);
                    if brk_chars > self.chunk_overlap {
                        end = start + brk_chars;
                    }
                }
            }

            push_trimmed(text, start_byte + bounds[start], start_byte + bounds[end], out);

            if end >= total {
                break;
            }
            start = end - self.chunk_overlap;
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte ranges of non-blank paragraphs (separated by blank lines)
fn paragraphs(text: &str) -> Vec<(usize, usize)> {
    let mut paras = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if line.trim().is_empty() {
            if let Some(para) = current.take() {
                paras.push(para);
            }
            continue;
        }

        let line_end = line_start + line.trim_end_matches(['\n', '\r']).len();
        current = Some(match current {
            Some((start, _)) => (start, line_end),
            None => (line_start, line_end),
        });
    }

    if let Some(para) = current {
        paras.push(para);
    }
    paras
}

/// Offset just past the last newline or sentence end in `s`
fn find_break_point(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    for i in (0..bytes.len()).rev() {
        if bytes[i] == b'\n' {
            return Some(i + 1);
        }
        if i > 0
            && matches!(bytes[i], b'.' | b'!' | b'?')
            && i + 1 < bytes.len()
            && bytes[i + 1] == b' '
        {
            return Some(i + 2);
        }
    }
    None
}

fn push_trimmed(text: &str, start: usize, end: usize, out: &mut Vec<TextChunk>) {
    let raw = &text[start..end];
    let trimmed_start = raw.trim_start();
    let lead = raw.len() - trimmed_start.len();
    let trimmed = trimmed_start.trim_end();
    if trimmed.is_empty() {
        return;
    }
    out.push(TextChunk {
        text: trimmed.to_string(),
        start: start + lead,
        end: start + lead + trimmed.len(),
    });
}

/// Turn one source's text into documents, one page per form-feed section
pub fn ingest_text(splitter: &TextSplitter, source: &str, text: &str) -> Vec<Document> {
    let mut documents = Vec::new();

    for (page_index, page) in text.split(PAGE_BREAK).enumerate() {
        let page_number = page_index as u32 + 1;
        for (chunk_index, chunk) in splitter.split(page).into_iter().enumerate() {
            let chunk_index = chunk_index as u32;
            let metadata = SourceMetadata::new(source)
                .with_page(page_number)
                .with_chunk_index(chunk_index)
                .with_offsets(chunk.start, chunk.end);
            documents.push(Document::new(
                Document::stable_id(source, Some(page_number), chunk_index),
                chunk.text,
                metadata,
            ));
        }
    }

    documents
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Text of every PDF page in page order, joined with [`PAGE_BREAK`]
fn pdf_text(bytes: &[u8]) -> Result<String, lopdf::Error> {
    let pdf = lopdf::Document::load_mem(bytes)?;
    let pages = pdf
        .get_pages()
        .keys()
        .map(|&number| pdf.extract_text(&[number]).map(|text| text.replace(PAGE_BREAK, "\n")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pages.join(&PAGE_BREAK.to_string()))
}

async fn read_source(path: &Path) -> Result<String, IngestError> {
    let io_error = |source| IngestError::Io {
        path: path.display().to_string(),
        source,
    };

    if !is_pdf(path) {
        return tokio::fs::read_to_string(path).await.map_err(io_error);
    }

    let bytes = tokio::fs::read(path).await.map_err(io_error)?;
    let pdf_error = |reason: String| IngestError::Pdf {
        path: path.display().to_string(),
        reason,
    };
    tokio::task::spawn_blocking(move || pdf_text(&bytes))
        .await
        .map_err(|e| pdf_error(e.to_string()))?
        .map_err(|e| pdf_error(e.to_string()))
}

/// Ingest a plain text file, or a PDF when the extension says so
pub async fn ingest_file(splitter: &TextSplitter, path: &Path) -> Result<Vec<Document>, IngestError> {
    let start = Instant::now();
    let text = read_source(path).await?;

    let source = path.display().to_string();
    let documents = ingest_text(splitter, &source, &text);
    let pages = text.split(PAGE_BREAK).count();
    log_source_ingested(&source, pages, documents.len(), start.elapsed().as_millis() as u64);
    Ok(documents)
}

/// Load every corpus path in configuration order
pub async fn load_corpus(config: &CorpusConfig) -> Result<Vec<Document>, IngestError> {
    let splitter = TextSplitter::from_config(config)?;
    let mut documents = Vec::new();
    for path in &config.paths {
        documents.extend(ingest_file(&splitter, path).await?);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_invalid_chunking_rejected() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 20).is_ok());
    }

    #[test]
    fn test_small_paragraphs_are_packed() {
        let splitter = TextSplitter::new(50, 10).unwrap();
        let chunks = splitter.split("First para.\n\nSecond para.\n\nThird para.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "First para.\n\nSecond para.\n\nThird para.");
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {} talks about the fellowship.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let splitter = TextSplitter::new(200, 60).unwrap();
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 200);
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_paragraph_overlap_is_carried() {
        let splitter = TextSplitter::new(30, 12).unwrap();
        let chunks = splitter.split("aaaaaaaaaa\n\nbbbbbbbbbb\n\ncccccccccc");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaaaaaaaa\n\nbbbbbbbbbb");
        assert_eq!(chunks[1].text, "bbbbbbbbbb\n\ncccccccccc");
    }

    #[test]
    fn test_long_paragraph_uses_window() {
        let sentence = "The road goes ever on and on. ";
        let text = sentence.repeat(20);
        let splitter = TextSplitter::new(100, 20).unwrap();
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 100);
            assert!(chunk.text.ends_with('.'));
        }
    }

    #[test]
    fn test_window_handles_multibyte_text() {
        let text = "ä".repeat(250);
        let splitter = TextSplitter::new(100, 10).unwrap();
        let chunks = splitter.split(&text);

        assert_eq!(chunks[0].text.chars().count(), 100);
        assert_eq!(chunks.last().unwrap().end, text.len());
    }

    #[test]
    fn test_pages_and_stable_ids() {
        let splitter = TextSplitter::new(1000, 200).unwrap();
        let text = "Page one text.\u{000C}Page two text.";
        let docs = ingest_text(&splitter, "book.txt", text);
        let again = ingest_text(&splitter, "book.txt", text);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source_metadata.page, Some(1));
        assert_eq!(docs[1].source_metadata.page, Some(2));
        assert_eq!(docs[1].source_metadata.chunk_index, 0);
        assert_eq!(docs[0].id, again[0].id);
        assert_ne!(docs[0].id, docs[1].id);
        assert_eq!(docs[0].id, Document::stable_id("book.txt", Some(1), 0));
    }

    #[test]
    fn test_blank_pages_produce_nothing() {
        let splitter = TextSplitter::new(1000, 200).unwrap();
        let docs = ingest_text(&splitter, "blank.txt", "  \n\u{000C}\n\n");
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_load_corpus_from_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Three rings for the elven kings.\n\nSeven for the dwarf lords.").unwrap();

        let config = CorpusConfig {
            paths: vec![file.path().to_path_buf()],
            chunk_size: 1000,
            chunk_overlap: 200,
        };
        let docs = load_corpus(&config).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_metadata.source, file.path().display().to_string());
    }

    /// Writes a PDF with one Courier text line per page
    fn write_pdf(pages: &[&str]) -> tempfile::NamedTempFile {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Object, Stream};

        let mut pdf = lopdf::Document::with_version("1.5");
        let pages_id = pdf.new_object_id();
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = pdf.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let kids: Vec<Object> = pages
            .iter()
            .map(|line| {
                let content = Content {
                    operations: vec![
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec!["F1".into(), 12.into()]),
                        Operation::new("Td", vec![72.into(), 720.into()]),
                        Operation::new("Tj", vec![Object::string_literal(*line)]),
                        Operation::new("ET", vec![]),
                    ],
                };
                let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
                pdf.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                    "Resources" => resources_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                })
                .into()
            })
            .collect();

        let count = kids.len() as i64;
        pdf.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        pdf.trailer.set("Root", catalog_id);

        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        pdf.save_to(&mut file).unwrap();
        file
    }

    #[tokio::test]
    async fn test_pdf_pages_become_page_numbers() {
        let file = write_pdf(&["The Shire lies in Eriador.", "Rohan is the land of horses."]);
        let splitter = TextSplitter::new(1000, 200).unwrap();

        let docs = ingest_file(&splitter, file.path()).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source_metadata.page, Some(1));
        assert_eq!(docs[1].source_metadata.page, Some(2));
        assert!(docs[0].text.contains("Shire"));
        assert!(docs[1].text.contains("Rohan"));

        let source = file.path().display().to_string();
        assert_eq!(docs[1].id, Document::stable_id(&source, Some(2), 0));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_pdf_error() {
        let mut file = tempfile::Builder::new().suffix(".PDF").tempfile().unwrap();
        write!(file, "this is not a pdf").unwrap();
        let splitter = TextSplitter::new(1000, 200).unwrap();

        assert!(matches!(
            ingest_file(&splitter, file.path()).await,
            Err(IngestError::Pdf { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let config = CorpusConfig {
            paths: vec!["/nonexistent/corpus.txt".into()],
            ..CorpusConfig::default()
        };
        assert!(matches!(load_corpus(&config).await, Err(IngestError::Io { .. })));
    }
}
