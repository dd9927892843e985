//! Document text extraction: `.docx` → ordered, non-empty paragraphs.
//!
//! ## Why spawn_blocking?
//!
//! Inflating the ZIP entry and walking the XML are synchronous, CPU-bound
//! operations. `tokio::task::spawn_blocking` keeps them off the async worker
//! threads, the same way the backend call and file writes stay non-blocking.
//!
//! Only body paragraphs count. Table cells, formatting runs, images and
//! headers/footers are ignored: a `.docx` body lives in `word/document.xml`,
//! each `w:p` is a paragraph and its visible text is the concatenation of its
//! `w:t` runs.

use crate::error::RequestError;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DOCUMENT_PART: &str = "word/document.xml";

/// A document read from disk. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name including extension.
    pub name: String,
    pub path: PathBuf,
    /// Non-empty, trimmed paragraphs in document order.
    pub paragraphs: Vec<String>,
}

impl Document {
    /// Paragraphs joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}

/// Read a `.docx` file's paragraphs.
pub async fn read_document(path: &Path) -> Result<Document, RequestError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_document_blocking(&path))
        .await
        .map_err(|e| RequestError::DocumentUnreadable {
            path: PathBuf::new(),
            detail: format!("read task panicked: {e}"),
        })?
}

/// Blocking implementation of [`read_document`].
pub fn read_document_blocking(path: &Path) -> Result<Document, RequestError> {
    let unreadable = |detail: String| RequestError::DocumentUnreadable {
        path: path.to_path_buf(),
        detail,
    };

    let file = std::fs::File::open(path).map_err(|e| unreadable(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;
    let mut entry = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| unreadable(format!("{DOCUMENT_PART}: {e}")))?;

    let mut xml = String::with_capacity(entry.size() as usize);
    entry
        .read_to_string(&mut xml)
        .map_err(|e| unreadable(e.to_string()))?;

    let paragraphs = paragraphs_from_xml(&xml).map_err(unreadable)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    info!("Read '{}': {} paragraph(s)", name, paragraphs.len());

    Ok(Document {
        name,
        path: path.to_path_buf(),
        paragraphs,
    })
}

/// Extract body paragraphs from WordprocessingML.
///
/// `w:tab` becomes a tab, `w:br`/`w:cr` a newline. Paragraphs inside tables
/// and text boxes are skipped; a text box sits inside an outer `w:p`, which
/// keeps its own text intact. Blank paragraphs are dropped and the rest
/// trimmed.
pub fn paragraphs_from_xml(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" | b"w:txbxContent" => skip_depth += 1,
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if skip_depth == 0 => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text && skip_depth == 0 => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:tbl" | b"w:txbxContent" => skip_depth = skip_depth.saturating_sub(1),
                b"w:t" => in_text = false,
                b"w:p" if skip_depth == 0 => {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() {
                        paragraphs.push(trimmed.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
    }

    debug!("Parsed {} body paragraph(s)", paragraphs.len());
    Ok(paragraphs)
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s.,!?;:\-()]").unwrap());

/// Normalise article text before concept selection.
///
/// Collapses whitespace runs to a single space, then drops every character
/// that is not a word character, whitespace or one of `.,!?;:-()`.
pub fn clean_text(text: &str) -> String {
    let collapsed = RE_WHITESPACE.replace_all(text, " ");
    RE_DISALLOWED.replace_all(&collapsed, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>The solar farm </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>spans 200 acres.</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">   </w:t></w:r></w:p>
    <w:p/>
    <w:tbl><w:tr><w:tc><w:p><w:r><w:t>Cell text</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
    <w:p><w:r><w:t>Fish &amp; chips</w:t><w:tab/><w:t>on the pier</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn paragraphs_in_order_without_blanks_or_tables() {
        let paragraphs = paragraphs_from_xml(BODY).unwrap();
        assert_eq!(
            paragraphs,
            vec!["The solar farm spans 200 acres.", "Fish & chips\ton the pier"]
        );
    }

    #[test]
    fn text_box_does_not_split_its_paragraph() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p>
      <w:r><w:t xml:space="preserve">Turbines line the ridge </w:t></w:r>
      <w:r><w:pict><v:shape><v:textbox><w:txbxContent>
        <w:p><w:r><w:t>Sidebar caption</w:t></w:r></w:p>
      </w:txbxContent></v:textbox></v:shape></w:pict></w:r>
      <w:r><w:t>above the valley.</w:t></w:r>
    </w:p>
    <w:p><w:r><w:t>Next paragraph.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let paragraphs = paragraphs_from_xml(xml).unwrap();
        assert_eq!(
            paragraphs,
            vec!["Turbines line the ridge above the valley.", "Next paragraph."]
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(paragraphs_from_xml("<w:p><w:t>open</w:p>").is_err());
    }

    #[test]
    fn clean_text_collapses_and_strips() {
        assert_eq!(
            clean_text("  Solar\n\n farm — “big” & bold!  "),
            "Solar farm  big  bold!"
        );
        assert_eq!(clean_text("(a-b; c: d?)"), "(a-b; c: d?)");
    }

    #[test]
    fn clean_text_keeps_unicode_letters() {
        assert_eq!(clean_text("Café über"), "Café über");
    }

    #[test]
    fn document_text_joins_paragraphs() {
        let doc = Document {
            name: "a.docx".into(),
            path: PathBuf::from("a.docx"),
            paragraphs: vec!["One.".into(), "Two.".into()],
        };
        assert_eq!(doc.text(), "One.\nTwo.");
        assert!(!doc.is_empty());
    }
}
