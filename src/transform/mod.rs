//! Response body transforms.
//!
//! # Data Flow
//! ```text
//! backend body (chunks as received)
//!     → ChunkTransform::push (per chunk, may emit 0..n units)
//!     → ChunkTransform::finish (once, at end of stream)
//!     → client body
//! ```
//!
//! # Design Decisions
//! - Exactly one mode per deployment, chosen in config; bodies are never sniffed
//! - Transforms are synchronous state machines, so they test without I/O
//! - Every wait for the next backend chunk is bounded by the idle timeout
//! - The backend stream is consumed once; dropping the client body drops it too,
//!   which closes the upstream connection

pub mod json;
pub mod lines;
pub mod raw;
pub mod words;

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;
use axum::body::Bytes;
use axum::BoxError;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

pub use json::JsonReassembly;
pub use lines::LineBuffered;
pub use raw::RawPassthrough;
pub use words::WordBatcher;

/// Lazily produced, single-use body.
pub type BodyStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// How proxied response bodies are re-emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Byte-for-byte, chunked as received.
    #[default]
    Raw,
    /// One emission per newline-terminated line.
    Lines,
    /// Whitespace-delimited tokens in fixed-size batches.
    Words,
    /// One re-serialized document per complete JSON value.
    Json,
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamMode::Raw => "raw",
            StreamMode::Lines => "lines",
            StreamMode::Words => "words",
            StreamMode::Json => "json",
        })
    }
}

impl FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(StreamMode::Raw),
            "lines" => Ok(StreamMode::Lines),
            "words" => Ok(StreamMode::Words),
            "json" => Ok(StreamMode::Json),
            other => Err(format!(
                "unknown stream mode '{}' (expected raw, lines, words or json)",
                other
            )),
        }
    }
}

/// Incremental body rewriter.
pub trait ChunkTransform: Send {
    /// Feed one backend chunk; returns the units ready to send.
    fn push(&mut self, chunk: &[u8]) -> Vec<Bytes>;

    /// Backend stream ended; returns whatever is still owed to the client.
    fn finish(&mut self) -> Vec<Bytes>;
}

impl StreamMode {
    /// Fresh transform state for one response.
    pub fn transformer(self, word_batch_size: usize) -> Box<dyn ChunkTransform> {
        match self {
            StreamMode::Raw => Box::new(RawPassthrough),
            StreamMode::Lines => Box::new(LineBuffered::default()),
            StreamMode::Words => Box::new(WordBatcher::new(word_batch_size)),
            StreamMode::Json => Box::new(JsonReassembly::default()),
        }
    }
}

struct TransformState {
    upstream: BodyStream,
    transform: Box<dyn ChunkTransform>,
    ready: VecDeque<Bytes>,
    idle: Duration,
    done: bool,
}

/// Wrap a backend body so it is re-emitted through `transform`.
pub fn transform_body(
    upstream: BodyStream,
    transform: Box<dyn ChunkTransform>,
    idle: Duration,
) -> impl Stream<Item = Result<Bytes, BoxError>> + Send + 'static {
    let state = TransformState {
        upstream,
        transform,
        ready: VecDeque::new(),
        idle,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(unit) = state.ready.pop_front() {
                return Some((Ok(unit), state));
            }
            if state.done {
                return None;
            }

            match tokio::time::timeout(state.idle, state.upstream.next()).await {
                Ok(Some(Ok(chunk))) => {
                    let units = state.transform.push(&chunk);
                    state.ready.extend(units);
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Backend body stream failed");
                    state.done = true;
                    return Some((Err(e), state));
                }
                Ok(None) => {
                    let units = state.transform.finish();
                    state.ready.extend(units);
                    state.done = true;
                }
                Err(_) => {
                    tracing::warn!(idle_ms = state.idle.as_millis() as u64, "Backend body stalled");
                    state.done = true;
                    let err: BoxError =
                        Box::new(io::Error::new(io::ErrorKind::TimedOut, "backend body idle timeout"));
                    return Some((Err(err), state));
                }
            }
        }
    })
}

#[cfg(test)]
pub(crate) fn chunks_stream<I, C>(chunks: I) -> BodyStream
where
    I: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
{
    let chunks: Vec<Result<Bytes, BoxError>> = chunks
        .into_iter()
        .map(|c| Ok(Bytes::copy_from_slice(c.as_ref())))
        .collect();
    stream::iter(chunks).boxed()
}
