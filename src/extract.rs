//! Text extraction for uploaded documents (plain text, PDF, DOCX).
//!
//! Dispatch is by file extension; callers supply raw bytes plus the
//! original filename and receive plain UTF-8 text ready for splitting.

use std::io::Read;

use crate::error::{RagError, Result};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extensions handled by [`extract_text`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx"];

/// Extract plain text from an uploaded document.
///
/// Fails with an unsupported-format error for unknown extensions,
/// non-UTF-8 text files, or unreadable PDF/DOCX payloads. No partial
/// output is ever returned.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String> {
    let ext = filename
        .rsplit('.')
        .next()
        .filter(|e| *e != filename)
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" => extract_utf8(bytes, filename),
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        _ => Err(RagError::UnsupportedFormat(format!(
            "unsupported file type: {}",
            filename
        ))),
    }
}

fn extract_utf8(bytes: &[u8], filename: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| {
        RagError::UnsupportedFormat(format!("{} is not valid UTF-8 text", filename))
    })
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::UnsupportedFormat(format!("PDF extraction failed: {}", e)))
}

/// Pull the `w:t` text runs out of `word/document.xml`, inserting a
/// newline at each paragraph end.
fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::UnsupportedFormat(format!("DOCX extraction failed: {}", e)))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| RagError::UnsupportedFormat("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| RagError::UnsupportedFormat(format!("DOCX extraction failed: {}", e)))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(RagError::UnsupportedFormat(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_text_runs(&doc_xml)
}

fn extract_text_runs(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) =
                        reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                // Paragraph boundary
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(RagError::UnsupportedFormat(format!(
                    "DOCX extraction failed: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let text = extract_text(b"hello world", "notes.txt").unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn markdown_passes_through() {
        let text = extract_text(b"# Title\n\nbody", "readme.md").unwrap();
        assert!(text.starts_with("# Title"));
    }

    #[test]
    fn extension_is_case_insensitive() {
        let text = extract_text(b"hello", "NOTES.TXT").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = extract_text(b"foo", "image.png").unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_extension_is_rejected() {
        let err = extract_text(b"foo", "Makefile").unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn invalid_utf8_text_is_rejected() {
        let err = extract_text(&[0xff, 0xfe, 0x00], "bad.txt").unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn invalid_pdf_is_rejected() {
        let err = extract_text(b"not a pdf", "doc.pdf").unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn invalid_docx_is_rejected() {
        let err = extract_text(b"not a zip", "doc.docx").unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn docx_text_runs_are_joined_with_paragraph_breaks() {
        let xml = br#"<w:document xmlns:w="ns"><w:body>
            <w:p><w:r><w:t>first</w:t></w:r></w:p>
            <w:p><w:r><w:t>second</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = extract_text_runs(xml).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }
}
