//! Kokoro-82M engine behind the [`SpeechEngine`](crate::engine::SpeechEngine) seam.
//!
//! Synthesis runs locally: espeak-ng converts each text segment to IPA, the
//! IPA maps to token ids through the model's vocabulary, and a Kokoro ONNX
//! session turns tokens plus a voice style vector into 24 kHz mono audio.
//! One loaded [`KokoroModel`] can back every language key's engine — the
//! model itself is language-agnostic, only phonemization differs.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed (or bundled via
//! [`EspeakConfig`](phonemizer::EspeakConfig)):
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # 8-bit quantized model, CPU-optimized
//! ├── voices-v1.0.bin                 # voice style archive (.npz format)
//! └── config.json                     # vocabulary
//! ```
//!
//! Voices follow the pattern `{language_prefix}_{name}` (`af_heart`,
//! `bf_emma`, `jf_alpha`, …); the prefix decides the espeak-ng language.

pub mod engine;
pub mod model;
pub mod phonemizer;
pub mod voices;

pub use engine::KokoroEngine;
pub use model::{KokoroError, KokoroModel, SAMPLE_RATE};
pub use phonemizer::EspeakConfig;
