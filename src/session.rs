//! The top-level orchestrator: one request in, one audio file out.

use std::path::PathBuf;
use std::sync::PoisonError;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::audio;
use crate::config::GenerationConfig;
use crate::engine::{InvocationSpec, SPEED_RANGE};
use crate::error::GenerationError;
use crate::persist;
use crate::router::EngineRegistry;
use crate::stream::{self, StopReason};
use crate::voices::VoiceCatalog;

/// One speech generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Voice name, e.g. `"af_bella"`.
    pub voice: String,
    /// Text to synthesize.
    pub text: String,
    /// Speed multiplier within [`SPEED_RANGE`].
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Output format: `"wav"`, `"mp3"` or `"aac"`.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_speed() -> f32 {
    1.0
}

fn default_format() -> String {
    "wav".to_string()
}

/// What a completed generation produced.
///
/// A generation that stopped early on a budget is still a success; `stop`
/// and the segment counts say how much of the input was covered, and
/// `degraded_format` flags a transcode that fell back to WAV.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// The canonical WAV that was written.
    pub wav_path: PathBuf,
    /// The file to hand to the caller (equals `wav_path` unless transcoded).
    pub output_path: PathBuf,
    pub samples_written: usize,
    pub duration_secs: f64,
    pub segments_seen: usize,
    pub segments_with_audio: usize,
    pub stop: StopReason,
    pub degraded_format: bool,
}

/// Wires the registry, voice catalog and configuration into the generate
/// path, and guarantees engine cleanup when it goes away.
pub struct Session {
    registry: EngineRegistry,
    catalog: VoiceCatalog,
    config: GenerationConfig,
}

impl Session {
    pub fn new(registry: EngineRegistry, catalog: VoiceCatalog, config: GenerationConfig) -> Self {
        Self {
            registry,
            catalog,
            config,
        }
    }

    /// Available voice names.
    pub fn voices(&self) -> &[String] {
        self.catalog.names()
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Run one request end to end: validate, resolve the engine, consume
    /// the segment stream under the configured budgets, concatenate,
    /// persist with retry, transcode.
    ///
    /// Validation happens before any engine work, so an oversized text or
    /// out-of-range speed never triggers a model load. Budget expiry during
    /// consumption is not an error — the partial audio is persisted and the
    /// report says why consumption stopped.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationReport, GenerationError> {
        self.validate(request)?;

        let engine = self.registry.resolve(&request.voice)?;
        log::info!(
            "generating speech: voice='{}', speed={}x, {} chars of text",
            request.voice,
            request.speed,
            request.text.chars().count()
        );

        let spec = InvocationSpec {
            text: request.text.clone(),
            voice: request.voice.clone(),
            speed: request.speed,
            split_pattern: self.config.split_pattern.clone(),
        };
        let segments = {
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            engine.invoke(spec).map_err(GenerationError::Invocation)?
        };

        let outcome = stream::consume(segments, &self.config.budgets());
        let buffer = audio::concatenate(outcome.buffers)?;
        if buffer.sample_rate != self.config.sample_rate {
            log::warn!(
                "engine produced {} Hz audio, expected {} Hz",
                buffer.sample_rate,
                self.config.sample_rate
            );
        }

        let wav_path = self.output_wav_path(&request.voice);
        persist::write_wav_with_retry(&buffer, &wav_path, &self.config.retry_policy())?;
        let transcoded = persist::transcode(&wav_path, &request.format);

        Ok(GenerationReport {
            samples_written: buffer.samples.len(),
            duration_secs: buffer.duration_secs(),
            segments_seen: outcome.segments_seen,
            segments_with_audio: outcome.segments_with_audio,
            stop: outcome.stop,
            degraded_format: transcoded.degraded,
            output_path: transcoded.path,
            wav_path,
        })
    }

    fn validate(&self, request: &GenerationRequest) -> Result<(), GenerationError> {
        if request.text.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("text is empty".to_string()));
        }
        let chars = request.text.chars().count();
        if chars > self.config.max_text_chars {
            return Err(GenerationError::InvalidRequest(format!(
                "text is too long ({chars} characters, limit {})",
                self.config.max_text_chars
            )));
        }
        if !request.speed.is_finite() || !SPEED_RANGE.contains(&request.speed) {
            return Err(GenerationError::InvalidRequest(format!(
                "speed {} outside {:?}",
                request.speed, SPEED_RANGE
            )));
        }
        if !self.catalog.contains(&request.voice) {
            return Err(GenerationError::InvalidRequest(format!(
                "unknown voice '{}'",
                request.voice
            )));
        }
        Ok(())
    }

    fn output_wav_path(&self, voice: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        self.config.output_dir.join(format!("tts_{voice}_{stamp}.wav"))
    }
}

impl Drop for Session {
    /// Best-effort cleanup on every exit path. Release failures are logged
    /// inside the registry; nothing here can panic.
    fn drop(&mut self) {
        log::debug!("session closing, releasing engines");
        self.registry.shutdown();
    }
}
