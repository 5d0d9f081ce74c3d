//! Text-layer density check: is this PDF's embedded text worth trusting?
//!
//! A scanned PDF has pages but (almost) no text layer; a PDF with a broken
//! font map yields a few stray glyphs per page. Both show up as a low
//! characters-per-page ratio, which is far cheaper to compute than any
//! visual inspection of the pages.

/// Whether a PDF with `page_count` pages and text layer `text` should be
/// transcribed from pixels instead.
///
/// Returns `true` when `trimmed_len(text) < threshold × page_count`.
/// A document with zero pages never needs OCR.
pub fn needs_ocr(text: &str, page_count: usize, threshold: usize) -> bool {
    if page_count == 0 {
        return false;
    }
    let chars = text.trim().chars().count();
    chars < threshold.saturating_mul(page_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_three_page_document_triggers() {
        assert!(needs_ocr(&"x".repeat(140), 3, 50));
    }

    #[test]
    fn dense_three_page_document_does_not_trigger() {
        assert!(!needs_ocr(&"x".repeat(151), 3, 50));
    }

    #[test]
    fn exact_threshold_is_dense_enough() {
        assert!(!needs_ocr(&"x".repeat(150), 3, 50));
    }

    #[test]
    fn zero_pages_never_trigger() {
        assert!(!needs_ocr("", 0, 50));
        assert!(!needs_ocr(&"x".repeat(10_000), 0, 50));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let padded = format!("{}{}{}", " \n".repeat(100), "x".repeat(40), "\n\n");
        assert!(needs_ocr(&padded, 1, 50));
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 50 two-byte characters fill one page exactly.
        assert!(!needs_ocr(&"é".repeat(50), 1, 50));
        assert!(needs_ocr(&"é".repeat(49), 1, 50));
    }

    #[test]
    fn threshold_is_configurable() {
        assert!(!needs_ocr(&"x".repeat(30), 1, 25));
        assert!(needs_ocr(&"x".repeat(30), 1, 40));
    }
}
