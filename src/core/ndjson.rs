//! Newline-delimited JSON tokenizer.
//!
//! The backend flushes whatever it has, so a chunk may end in the middle of a
//! line or even in the middle of a multi-byte UTF-8 sequence. Bytes are held
//! until a `\n` arrives and only complete lines are decoded.

#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    // 已確認沒有換行的前綴長度
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and collect every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buf[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            if let Some(line) = decode_line(&self.buf[start..end]) {
                lines.push(line);
            }
            start = end + 1;
            from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        lines
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        decode_line(&rest)
    }

    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);
    if line.trim().is_empty() {
        return None;
    }
    Some(line.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(decoder.pending_bytes(), 0);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"type\":\"llm_").is_empty());
        assert!(decoder.push(b"chunk\"}").is_empty());
        assert_eq!(decoder.push(b"\r\n{\"x\""), vec!["{\"type\":\"llm_chunk\"}"]);
        assert_eq!(decoder.finish().as_deref(), Some("{\"x\""));
    }

    #[test]
    fn test_multibyte_character_split() {
        let text = "{\"content\":\"réunion ☕\"}\n".as_bytes();
        // 在 '☕' 的三個位元組中間切開
        let cut = text.len() - 4;
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&text[..cut]).is_empty());
        assert_eq!(decoder.push(&text[cut..]), vec!["{\"content\":\"réunion ☕\"}"]);
    }

    #[test]
    fn test_invalid_utf8_decoded_lossily() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"{\"a\":\"\xff\"}\n{\"b\":1}\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "{\"a\":\"\u{FFFD}\"}");
        assert_eq!(lines[1], "{\"b\":1}");
    }

    #[test]
    fn test_long_line_in_small_chunks() {
        let line = format!("{{\"content\":\"{}\"}}", "x".repeat(5000));
        let mut decoder = LineDecoder::new();
        for chunk in line.as_bytes().chunks(7) {
            assert!(decoder.push(chunk).is_empty());
        }
        assert_eq!(decoder.pending_bytes(), line.len());
        assert_eq!(decoder.push(b"\n{\"next\""), vec![line]);
        assert_eq!(decoder.pending_bytes(), 7);
        assert_eq!(decoder.finish().as_deref(), Some("{\"next\""));
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"\n  \n\r\n{}\n"), vec!["{}"]);
    }
}
