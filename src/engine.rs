//! The speech-engine collaborator seam.
//!
//! All value-producing synthesis work lives behind [`SpeechEngine`]: the
//! orchestrator hands an engine an [`InvocationSpec`] and gets back a lazy,
//! finite, one-pass stream of [`Segment`]s. The trait is the adaptation
//! layer for whatever library actually runs inference; releasing the engine
//! tears the adaptation down with it.

use crate::audio::AudioBuffer;

/// One chunk of synthesized output.
///
/// Segments arrive in sequence order. Audio may be absent for a segment
/// (for example, a chunk that phonemized to nothing) — the consumer skips
/// such segments without failing the request.
#[derive(Debug, Clone)]
pub struct Segment {
    /// The text span this segment was synthesized from.
    pub graphemes: String,
    /// Phoneme representation, when the engine exposes one.
    pub phonemes: Option<String>,
    /// Synthesized audio for this span, if any was produced.
    pub audio: Option<AudioBuffer>,
}

/// Accepted speech speed multipliers.
pub const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.5..=2.0;

/// Arguments for one engine invocation.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    /// The full text to synthesize.
    pub text: String,
    /// Voice name, e.g. `"af_bella"`.
    pub voice: String,
    /// Speech speed multiplier within [`SPEED_RANGE`].
    pub speed: f32,
    /// Delimiter used to chunk the text into segments.
    pub split_pattern: String,
}

/// The lazy segment sequence an engine produces.
///
/// One pass only: once an item has been pulled it cannot be replayed, and
/// dropping the iterator abandons whatever the engine had not yet produced.
pub type SegmentStream = Box<dyn Iterator<Item = Result<Segment, EngineError>> + Send>;

/// Errors raised by a speech engine, before or during streaming.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// An invocation argument the engine cannot work with. Raised before
    /// any segment is produced.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("voice '{0}' not available")]
    VoiceNotFound(String),
    /// A file or external tool the engine needs is missing.
    #[error("missing resource: {0}")]
    MissingResource(String),
    /// Inference or another internal operation failed.
    #[error("runtime failure: {0}")]
    Runtime(String),
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Short label used when logging errors by category.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::InvalidArgument(_) => "argument",
            EngineError::VoiceNotFound(_) => "voice",
            EngineError::MissingResource(_) => "resource",
            EngineError::Runtime(_) => "runtime",
            EngineError::Other(_) => "other",
        }
    }
}

/// Common interface for speech synthesis engines.
///
/// Implementations wrap an external model/pipeline library. Construction is
/// expensive (weights are loaded, device memory allocated) and handled by
/// the [`EngineRegistry`](crate::router::EngineRegistry), which caches one
/// engine per language key.
pub trait SpeechEngine: Send {
    /// Start a synthesis run.
    ///
    /// Malformed arguments fail here, before the stream exists. The
    /// returned stream yields segments in order until the text is exhausted
    /// or an error ends it.
    fn invoke(&mut self, spec: InvocationSpec) -> Result<SegmentStream, EngineError>;

    /// Release model weights and any other held resources.
    ///
    /// Called during session cleanup. Must not panic; engines that have
    /// nothing to release can rely on the default no-op.
    fn release(&mut self) {}
}
