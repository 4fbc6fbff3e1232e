//! Speech synthesis engine implementations.
//!
//! Enable engines via Cargo features:
//! - `kokoro` - Kokoro-82M TTS (ONNX format, espeak-ng required)

#[cfg(feature = "kokoro")]
pub mod kokoro;
