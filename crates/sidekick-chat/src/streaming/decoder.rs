//! Incremental UTF-8 decoding for chunked response bodies.

/// Decodes a byte stream into text chunk by chunk.
///
/// An incomplete multi-byte sequence at the end of a chunk is held back and
/// completed by the next chunk. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, prefixed by any bytes held back from the
    /// previous one.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            // truncated sequence, wait for the rest
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// End of stream. A dangling partial sequence becomes one U+FFFD.
    pub fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"Hello, "), "Hello, ");
        assert_eq!(decoder.decode(b"world"), "world");
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        // "é" is C3 A9, "🙂" is F0 9F 99 82
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'c', b'a', b'f', 0xC3]), "caf");
        assert_eq!(decoder.decode(&[0xA9, b' ', 0xF0, 0x9F]), "é ");
        assert_eq!(decoder.decode(&[0x99]), "");
        assert_eq!(decoder.decode(&[0x82, b'!']), "🙂!");
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
        assert_eq!(decoder.decode(&[0xC3, b'x']), "\u{FFFD}x");
    }

    #[test]
    fn test_flush_reports_truncated_tail() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'o', b'k', 0xE2, 0x82]), "ok");
        assert_eq!(decoder.flush(), "\u{FFFD}");
        assert_eq!(decoder.flush(), "");
    }
}
