//! Plain-text decoding for everything the dispatcher does not recognise.
//!
//! Bytes are decoded as UTF-8, lossily: unrecognised binary content comes out
//! as replacement characters rather than an error, so a mislabelled file
//! still reaches the user and can be inspected.

use tracing::debug;

/// Decode `bytes` as UTF-8 text, dropping a leading byte-order mark.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = String::from_utf8_lossy(bytes);
    if text.contains('\u{FFFD}') {
        debug!("Input is not valid UTF-8; replaced undecodable bytes");
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_passes_through() {
        assert_eq!(decode_text("naïve café\n".as_bytes()), "naïve café\n");
    }

    #[test]
    fn bom_is_stripped() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello"), "hello");
    }

    #[test]
    fn invalid_bytes_become_replacement_chars() {
        let out = decode_text(&[b'o', b'k', 0xFF, 0xFE]);
        assert!(out.starts_with("ok"));
        assert!(out.contains('\u{FFFD}'));
    }

    #[test]
    fn empty_input_is_empty_text() {
        assert_eq!(decode_text(b""), "");
    }
}
