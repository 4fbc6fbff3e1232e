//! # kokoro-studio
//!
//! Thin front-ends around a pretrained Kokoro text-to-speech engine, built
//! on a bounded, fault-tolerant generation pipeline.
//!
//! The actual synthesis (phonemization, neural vocoding, voice embedding
//! lookup) is delegated to a [`SpeechEngine`] collaborator that produces a
//! lazy stream of audio segments. This crate supplies everything around it:
//!
//! - **Voice routing** — a voice name's prefix selects which engine instance
//!   handles the request, with one cached engine per language key
//!   ([`router::EngineRegistry`])
//! - **Bounded consumption** — the segment stream is driven under total and
//!   per-segment time budgets; budget expiry keeps the partial result
//!   ([`stream::consume`])
//! - **Accumulation** — in-order concatenation of segment audio into one
//!   24 kHz buffer ([`audio::concatenate`])
//! - **Persistence** — WAV output with retry on transient contention, plus
//!   optional mp3/aac transcoding ([`persist`])
//! - **Orchestration** — request validation, the full generate path, and
//!   guaranteed best-effort cleanup ([`session::Session`])
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kokoro-studio = { version = "0.3", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use kokoro_studio::{
//!     config::GenerationConfig,
//!     router::EngineRegistry,
//!     session::{GenerationRequest, Session},
//!     voices::VoiceCatalog,
//! };
//!
//! let registry = EngineRegistry::new(|key| build_engine_for(key));
//! let session = Session::new(registry, VoiceCatalog::curated(), GenerationConfig::default());
//!
//! let report = session.generate(&GenerationRequest {
//!     voice: "af_bella".to_string(),
//!     text: "Hello, welcome to this text-to-speech test.".to_string(),
//!     speed: 1.0,
//!     format: "wav".to_string(),
//! })?;
//! println!("wrote {}", report.output_path.display());
//! # Ok::<(), kokoro_studio::error::GenerationError>(())
//! ```
//!
//! The binaries `kokoro-menu` (interactive menu) and `kokoro-web` (HTTP
//! form) wire a [`session::Session`] to the real ONNX engine behind the
//! `kokoro` cargo feature.

pub mod audio;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod persist;
pub mod router;
pub mod session;
pub mod stream;
pub mod voices;

pub use audio::AudioBuffer;
pub use config::GenerationConfig;
pub use engine::{EngineError, InvocationSpec, Segment, SegmentStream, SpeechEngine};
pub use error::GenerationError;
pub use router::EngineRegistry;
pub use session::{GenerationReport, GenerationRequest, Session};
pub use stream::{StopReason, StreamBudgets};
pub use voices::VoiceCatalog;
