//! DOCX text extraction.
//!
//! A `.docx` file is a zip archive; the body lives in `word/document.xml` as
//! WordprocessingML. We only need the raw text: every `<w:t>` run, with a
//! newline per paragraph (`<w:p>`), a tab for `<w:tab/>` and a newline for
//! `<w:br/>`. Styles, numbering and headers are ignored.

use crate::error::IngestError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const DOCUMENT_XML: &str = "word/document.xml";

/// Extract the whole-document raw text of a DOCX file.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, IngestError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IngestError::decode("docx", format!("not a zip archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| IngestError::decode("docx", format!("missing {DOCUMENT_XML}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| IngestError::decode("docx", format!("reading {DOCUMENT_XML}: {e}")))?;

    document_text(&xml)
}

/// Walk WordprocessingML and collect run text.
fn document_text(xml: &str) -> Result<String, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" | b"p" => text.push('\n'),
                _ => (),
            },
            Ok(Event::Text(t)) if in_text_run => {
                let content = t
                    .unescape()
                    .map_err(|e| IngestError::decode("docx", format!("bad text run: {e}")))?;
                text.push_str(&content);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => text.push('\n'),
                _ => (),
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::decode(
                    "docx",
                    format!("malformed XML at byte {}: {e}", reader.buffer_position()),
                ))
            }
            _ => (),
        }
        buf.clear();
    }

    Ok(text.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
    <w:p><w:r><w:t>A</w:t><w:tab/><w:t>B &amp; C</w:t></w:r></w:p>
    <w:p><w:r><w:t>line one</w:t><w:br/><w:t>line two</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    fn docx_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            for (name, body) in entries {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn extracts_paragraphs_tabs_and_breaks() {
        let bytes = docx_with(&[(DOCUMENT_XML, BODY)]);
        let text = extract_docx_text(&bytes).unwrap();
        assert_eq!(text, "Hello world\nA\tB & C\nline one\nline two");
    }

    #[test]
    fn empty_paragraph_keeps_its_line() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Title</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>Body</w:t></w:r></w:p>
</w:body></w:document>"#;
        assert_eq!(document_text(xml).unwrap(), "Title\n\nBody");
    }

    #[test]
    fn ignores_whitespace_between_elements() {
        let text = document_text(BODY).unwrap();
        assert!(!text.starts_with(char::is_whitespace), "got {text:?}");
    }

    #[test]
    fn missing_document_xml_is_decode_error() {
        let bytes = docx_with(&[("word/styles.xml", "<styles/>")]);
        let err = extract_docx_text(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn non_zip_is_decode_error() {
        let err = extract_docx_text(b"plain text pretending").unwrap_err();
        assert!(matches!(err, IngestError::Decode { format: "docx", .. }));
    }
}
