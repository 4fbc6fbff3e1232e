//! Request-level error taxonomy.

use crate::engine::EngineError;

/// Everything that can fail a generation request.
///
/// Each variant is produced at exactly one stage of the pipeline; soft
/// conditions (budget expiry, degraded transcode) are not errors and are
/// reported through [`GenerationReport`](crate::session::GenerationReport)
/// instead.
#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    /// Request parameters rejected before any engine work.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// First-use engine construction for a language key failed. Fatal to
    /// this request only; the key is retried on the next request.
    #[error("failed to construct engine for key '{key}': {source}")]
    EngineConstruction {
        key: &'static str,
        #[source]
        source: EngineError,
    },
    /// The engine rejected the invocation arguments before producing any
    /// segment.
    #[error("engine rejected invocation: {0}")]
    Invocation(#[source] EngineError),
    /// The stream ended with zero usable audio segments.
    #[error("no audio segments generated")]
    EmptyResult,
    /// Accumulated segments disagreed on their sample rate.
    #[error("sample rate mismatch between segments: expected {expected} Hz, found {found} Hz")]
    SampleRateMismatch { expected: u32, found: u32 },
    /// The output file could not be written, even after retries.
    #[error("could not save audio after {attempts} attempts: {source}")]
    Persistence {
        attempts: u32,
        #[source]
        source: hound::Error,
    },
}
