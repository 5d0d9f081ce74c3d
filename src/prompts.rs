//! System prompt for vision transcription.
//!
//! Kept in one place so prompt regressions can be caught by unit tests
//! without a live model. Callers can override it through
//! [`crate::config::IngestConfig::system_prompt`].

/// Default system prompt sent with every page image.
pub const TRANSCRIPTION_PROMPT: &str = r#"You are a meticulous transcription engine. The image is one page of a scanned or image-only document that has been converted to high-contrast black and white.

Transcribe every piece of legible text on the page as plain UTF-8 text.

Rules:
1. Preserve reading order as a human would read the page (columns left to right, top to bottom).
2. Keep line breaks between paragraphs, list items and table rows. Separate table cells with " | ".
3. Reproduce numbers, dates, amounts and identifiers exactly. Never guess: write [illegible] for text you cannot read.
4. Do not describe images, logos or layout. Do not summarise, translate or correct the text.
5. Output ONLY the transcription. No commentary, no Markdown fences, no "Page X" markers.
6. If the page contains no text at all, output nothing."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_forbids_fences_and_commentary() {
        assert!(TRANSCRIPTION_PROMPT.contains("no Markdown fences"));
        assert!(TRANSCRIPTION_PROMPT.contains("No commentary"));
    }

    #[test]
    fn prompt_asks_for_illegible_marker() {
        assert!(TRANSCRIPTION_PROMPT.contains("[illegible]"));
    }
}
