//! Byte-for-byte passthrough.

use axum::body::Bytes;
use crate::transform::ChunkTransform;

/// Emits every non-empty chunk unchanged, in arrival order.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawPassthrough;

impl ChunkTransform for RawPassthrough {
    fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        if chunk.is_empty() {
            Vec::new()
        } else {
            vec![Bytes::copy_from_slice(chunk)]
        }
    }

    fn finish(&mut self) -> Vec<Bytes> {
        Vec::new()
    }
}
