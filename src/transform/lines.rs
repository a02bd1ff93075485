//! Newline-delimited passthrough.
//!
//! Each emitted unit is one line including its `\n`. A trailing line without
//! a newline is flushed when the backend finishes, so concatenating the
//! output always reproduces the input bytes.

use axum::body::Bytes;
use crate::transform::ChunkTransform;

#[derive(Debug, Default)]
pub struct LineBuffered {
    pending: Vec<u8>,
}

impl ChunkTransform for LineBuffered {
    fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (line, tail) = rest.split_at(pos + 1);
            if self.pending.is_empty() {
                lines.push(Bytes::copy_from_slice(line));
            } else {
                self.pending.extend_from_slice(line);
                lines.push(Bytes::from(std::mem::take(&mut self.pending)));
            }
            rest = tail;
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    fn finish(&mut self) -> Vec<Bytes> {
        if self.pending.is_empty() {
            Vec::new()
        } else {
            vec![Bytes::from(std::mem::take(&mut self.pending))]
        }
    }
}
