//! The Kokoro engine exposed through the [`SpeechEngine`] seam.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::audio::AudioBuffer;
use crate::engine::{
    EngineError, InvocationSpec, Segment, SegmentStream, SpeechEngine, SPEED_RANGE,
};
use crate::router::engine_key;

use super::model::{KokoroError, KokoroModel, SAMPLE_RATE};
use super::phonemizer::{espeak_lang, ipa_to_ids, phonemize, EspeakConfig};

/// Kokoro text-to-speech engine.
///
/// Holds a shared reference to a loaded [`KokoroModel`]; several engine
/// instances (one per language key) can back onto one model, since the
/// model itself is language-agnostic. Releasing the engine drops its model
/// reference — the weights are freed once the last holder lets go.
pub struct KokoroEngine {
    model: Option<Arc<Mutex<KokoroModel>>>,
    espeak: EspeakConfig,
}

impl KokoroEngine {
    /// Load a model from a directory and wrap it in an engine.
    pub fn load(model_dir: &Path) -> Result<Self, KokoroError> {
        let model = KokoroModel::load(model_dir, None)?;
        Ok(Self::with_model(Arc::new(Mutex::new(model))))
    }

    /// Wrap an already-loaded model. This is how one model is shared
    /// across engine keys to conserve memory.
    pub fn with_model(model: Arc<Mutex<KokoroModel>>) -> Self {
        Self {
            model: Some(model),
            espeak: EspeakConfig::default(),
        }
    }

    /// Use a bundled espeak-ng instead of the system one.
    pub fn with_espeak(mut self, espeak: EspeakConfig) -> Self {
        self.espeak = espeak;
        self
    }

    /// Voice names the underlying model can synthesize.
    pub fn list_voices(&self) -> Vec<String> {
        match &self.model {
            Some(model) => model
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .list_voices()
                .into_iter()
                .map(String::from)
                .collect(),
            None => Vec::new(),
        }
    }
}

impl SpeechEngine for KokoroEngine {
    fn invoke(&mut self, spec: InvocationSpec) -> Result<SegmentStream, EngineError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EngineError::Runtime("engine already released".to_string()))?;

        if spec.split_pattern.is_empty() {
            return Err(EngineError::InvalidArgument(
                "split pattern is empty".to_string(),
            ));
        }
        if !spec.speed.is_finite() || !SPEED_RANGE.contains(&spec.speed) {
            return Err(EngineError::InvalidArgument(format!(
                "speed {} outside {SPEED_RANGE:?}",
                spec.speed
            )));
        }
        {
            let model = model.lock().unwrap_or_else(PoisonError::into_inner);
            if !model.has_voice(&spec.voice) {
                return Err(EngineError::VoiceNotFound(spec.voice));
            }
        }

        let chunks: Vec<String> = spec
            .text
            .split(spec.split_pattern.as_str())
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(String::from)
            .collect();
        let lang = espeak_lang(engine_key(&spec.voice));
        log::debug!(
            "invoking Kokoro: voice='{}', lang={lang}, {} segment(s)",
            spec.voice,
            chunks.len()
        );

        Ok(Box::new(KokoroSegmentIter {
            model: Arc::clone(model),
            espeak: self.espeak.clone(),
            chunks: chunks.into_iter(),
            voice: spec.voice,
            speed: spec.speed,
            lang,
        }))
    }

    fn release(&mut self) {
        if self.model.take().is_some() {
            log::debug!("Kokoro engine released its model reference");
        }
    }
}

/// Lazy per-segment synthesis: each `next()` phonemizes and runs inference
/// for one text chunk.
struct KokoroSegmentIter {
    model: Arc<Mutex<KokoroModel>>,
    espeak: EspeakConfig,
    chunks: std::vec::IntoIter<String>,
    voice: String,
    speed: f32,
    lang: &'static str,
}

impl Iterator for KokoroSegmentIter {
    type Item = Result<Segment, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        Some(self.synthesize_segment(chunk))
    }
}

impl KokoroSegmentIter {
    fn synthesize_segment(&mut self, chunk: String) -> Result<Segment, EngineError> {
        let ipa = phonemize(&chunk, self.lang, &self.espeak).map_err(EngineError::from)?;

        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        let ids = ipa_to_ids(&ipa, model.vocab());
        if ids.is_empty() {
            log::debug!("no phoneme tokens for chunk {chunk:?}");
            return Ok(Segment {
                graphemes: chunk,
                phonemes: Some(ipa),
                audio: None,
            });
        }

        let samples = model
            .synthesize_ids(&ids, &self.voice, self.speed)
            .map_err(EngineError::from)?;
        let audio = if samples.is_empty() {
            None
        } else {
            Some(AudioBuffer::new(samples, SAMPLE_RATE))
        };

        Ok(Segment {
            graphemes: chunk,
            phonemes: Some(ipa),
            audio,
        })
    }
}

impl From<KokoroError> for EngineError {
    fn from(err: KokoroError) -> Self {
        match err {
            KokoroError::VoiceNotFound(voice) => EngineError::VoiceNotFound(voice),
            KokoroError::EspeakNotFound => EngineError::MissingResource(err.to_string()),
            KokoroError::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                EngineError::MissingResource(err.to_string())
            }
            KokoroError::Config(msg) => EngineError::InvalidArgument(msg),
            KokoroError::Ort(_) | KokoroError::Shape(_) | KokoroError::Phonemizer(_) => {
                EngineError::Runtime(err.to_string())
            }
            other => EngineError::Other(other.to_string()),
        }
    }
}
