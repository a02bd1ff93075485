//! Word-batched reformatting.
//!
//! Decodes the body as UTF-8 (invalid sequences become U+FFFD, sequences
//! split across chunks are reassembled), collects whitespace-delimited tokens
//! and emits them in batches of `batch_size`, single-space separated. A token
//! counts as complete only once whitespace follows it or the body ends.

use axum::body::Bytes;
use crate::transform::ChunkTransform;

#[derive(Debug)]
pub struct WordBatcher {
    batch_size: usize,
    /// Bytes of an incomplete UTF-8 sequence.
    undecoded: Vec<u8>,
    /// Text of a token that may continue in the next chunk.
    partial: String,
    batch: Vec<String>,
    emitted_any: bool,
}

impl WordBatcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            undecoded: Vec::new(),
            partial: String::new(),
            batch: Vec::new(),
            emitted_any: false,
        }
    }

    fn decode(&mut self, chunk: &[u8]) -> String {
        self.undecoded.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.undecoded) {
                Ok(text) => {
                    out.push_str(text);
                    self.undecoded.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.undecoded[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.undecoded.drain(..valid + invalid);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            self.undecoded.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn render(&mut self, tokens: &[String]) -> Bytes {
        let mut unit = String::new();
        if self.emitted_any {
            unit.push(' ');
        }
        unit.push_str(&tokens.join(" "));
        self.emitted_any = true;
        Bytes::from(unit)
    }

    fn drain_full_batches(&mut self) -> Vec<Bytes> {
        let mut out = Vec::new();
        while self.batch.len() >= self.batch_size {
            let tokens: Vec<String> = self.batch.drain(..self.batch_size).collect();
            out.push(self.render(&tokens));
        }
        out
    }
}

impl ChunkTransform for WordBatcher {
    fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let text = self.decode(chunk);
        self.partial.push_str(&text);

        // Everything up to the last whitespace is made of complete tokens.
        let last_ws = self
            .partial
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(idx, c)| idx + c.len_utf8());
        if let Some(split) = last_ws {
            let tail = self.partial.split_off(split);
            let complete = std::mem::replace(&mut self.partial, tail);
            self.batch.extend(complete.split_whitespace().map(str::to_string));
        }

        self.drain_full_batches()
    }

    fn finish(&mut self) -> Vec<Bytes> {
        if !self.undecoded.is_empty() {
            let rest = String::from_utf8_lossy(&self.undecoded).into_owned();
            self.undecoded.clear();
            self.partial.push_str(&rest);
        }
        let partial = std::mem::take(&mut self.partial);
        self.batch.extend(partial.split_whitespace().map(str::to_string));

        let mut out = self.drain_full_batches();
        if !self.batch.is_empty() {
            let tokens = std::mem::take(&mut self.batch);
            out.push(self.render(&tokens));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(units: &[Bytes]) -> Vec<&str> {
        units.iter().map(|b| std::str::from_utf8(b).unwrap()).collect()
    }

    #[test]
    fn test_emits_full_batches_as_they_complete() {
        let mut t = WordBatcher::new(3);
        assert!(t.push(b"one two").is_empty());
        // "two" becomes complete only once whitespace follows it.
        assert_eq!(text(&t.push(b" three four ")), vec!["one two three"]);
        assert_eq!(text(&t.push(b"five six\n")), vec![" four five six"]);
        assert!(t.finish().is_empty());
    }

    #[test]
    fn test_final_partial_batch_flushed() {
        let mut t = WordBatcher::new(10);
        assert!(t.push(b"alpha  beta\tgam").is_empty());
        assert!(t.push(b"ma").is_empty());
        assert_eq!(text(&t.finish()), vec!["alpha beta gamma"]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let word = "héllo wörld ";
        let bytes = word.as_bytes();
        // Split inside the two-byte 'é'.
        let mut t = WordBatcher::new(2);
        assert!(t.push(&bytes[..2]).is_empty());
        assert_eq!(text(&t.push(&bytes[2..])), vec!["héllo wörld"]);
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut t = WordBatcher::new(5);
        t.push(b"ok \xff\xfe bad ");
        assert_eq!(text(&t.finish()), vec!["ok \u{FFFD}\u{FFFD} bad"]);
    }

    #[test]
    fn test_zero_batch_size_treated_as_one() {
        let mut t = WordBatcher::new(0);
        assert_eq!(text(&t.push(b"a b ")), vec!["a", " b"]);
    }
}
