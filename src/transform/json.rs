//! JSON reassembly.
//!
//! Bytes are accumulated until one or more complete JSON documents parse from
//! the front of the buffer; each document is re-serialized compactly (object
//! keys sorted) followed by `\n` and emitted as one unit. Numbers keep their
//! exact digits. Bytes that cannot start a document (SSE `data: ` prefixes,
//! log lines) are skipped up to the next `{`, `[` or newline, and a truncated
//! document larger than the buffer limit is discarded.

use axum::body::Bytes;
use serde_json::Value;
use crate::transform::ChunkTransform;

/// Largest incomplete document held while waiting for more bytes.
pub const MAX_PENDING_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug)]
pub struct JsonReassembly {
    pending: Vec<u8>,
    limit: usize,
}

impl JsonReassembly {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit: limit.max(1),
        }
    }
}

impl Default for JsonReassembly {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_BYTES)
    }
}

fn render(value: &Value) -> Option<Bytes> {
    let mut out = serde_json::to_vec(value).ok()?;
    out.push(b'\n');
    Some(Bytes::from(out))
}

/// Next place a document could start, strictly after `from`.
fn resync_point(buf: &[u8], from: usize) -> usize {
    buf[from + 1..]
        .iter()
        .position(|b| matches!(b, b'{' | b'[' | b'\n'))
        .map_or(buf.len(), |p| from + 1 + p)
}

impl ChunkTransform for JsonReassembly {
    fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.pending.extend_from_slice(chunk);

        let mut out = Vec::new();
        let mut start = 0;
        while start < self.pending.len() {
            let mut docs = serde_json::Deserializer::from_slice(&self.pending[start..]).into_iter::<Value>();
            match docs.next() {
                Some(Ok(value)) => {
                    start += docs.byte_offset();
                    out.extend(render(&value));
                }
                // Truncated document: wait for more bytes.
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => {
                    // Skip leading whitespace the parser already accepted.
                    let bad = start
                        + self.pending[start..]
                            .iter()
                            .position(|b| !b.is_ascii_whitespace())
                            .unwrap_or(0);
                    let next = resync_point(&self.pending, bad);
                    tracing::debug!(error = %e, skipped = next - bad, "Skipping bytes that are not JSON");
                    start = next;
                }
                None => {
                    start = self.pending.len();
                }
            }
        }
        self.pending.drain(..start);

        if self.pending.len() > self.limit {
            tracing::warn!(
                bytes = self.pending.len(),
                limit = self.limit,
                "Incomplete JSON document exceeds buffer limit, dropping it"
            );
            self.pending.clear();
        }
        out
    }

    fn finish(&mut self) -> Vec<Bytes> {
        let leftover = std::mem::take(&mut self.pending);
        if leftover.iter().any(|b| !b.is_ascii_whitespace()) {
            tracing::debug!(bytes = leftover.len(), "Dropping trailing bytes that never formed JSON");
        }
        Vec::new()
    }
}
