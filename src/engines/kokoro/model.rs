//! Kokoro ONNX model state and inference.

use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::voices::StyleStore;

/// Maximum number of phoneme tokens per inference call (before padding).
pub const MAX_PHONEME_LEN: usize = 510;

/// Style vector dimension for Kokoro.
pub const STYLE_DIM: usize = 256;

/// Output sample rate from the Kokoro model.
pub const SAMPLE_RATE: u32 = 24000;

/// Crossfade (in samples) when joining audio from a split phoneme sequence.
const CHUNK_CROSSFADE_SAMPLES: usize = 240; // 10ms @ 24kHz

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("phonemization failed: {0}")]
    Phonemizer(String),
    #[error("voice '{0}' not found in the voice archive")]
    VoiceNotFound(String),
    #[error("invalid config.json: {0}")]
    Config(String),
    #[error("failed to parse voice archive: {0}")]
    VoiceParse(String),
}

/// A loaded Kokoro model: ONNX session, voice styles and vocabulary.
///
/// Expensive to construct (weights are read and the graph optimized), cheap
/// to keep: share one instance across engine keys.
pub struct KokoroModel {
    session: Session,
    styles: StyleStore,
    vocab: HashMap<char, i64>,
    /// Detected token input name: "input_ids" or "tokens".
    tokens_input_name: String,
    /// True if the speed input expects int32, false for float32.
    speed_is_int32: bool,
}

impl KokoroModel {
    /// Load the model from a directory containing an `.onnx` file, a
    /// `voices-v1.0.bin` archive and a `config.json` vocabulary.
    pub fn load(model_dir: &Path, num_threads: Option<usize>) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("loading Kokoro model from {}", onnx_path.display());
        let session = init_session(&onnx_path, num_threads)?;

        let tokens_input_name = detect_tokens_input(&session);
        let speed_is_int32 = detect_speed_type(&session);
        log::info!(
            "detected: tokens_input='{tokens_input_name}', speed_is_int32={speed_is_int32}"
        );

        let voices_path = model_dir.join("voices-v1.0.bin");
        if !voices_path.exists() {
            return Err(KokoroError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "voice archive not found at {}. Download it from the Kokoro model repository.",
                    voices_path.display()
                ),
            )));
        }
        let styles = StyleStore::load(&voices_path)?;

        let config_path = model_dir.join("config.json");
        if !config_path.exists() {
            return Err(KokoroError::Config(format!(
                "config.json not found in {}",
                model_dir.display()
            )));
        }
        let vocab = load_vocab(&config_path)?;

        Ok(Self {
            session,
            styles,
            vocab,
            tokens_input_name,
            speed_is_int32,
        })
    }

    /// Mapping from IPA characters to token ids.
    pub fn vocab(&self) -> &HashMap<char, i64> {
        &self.vocab
    }

    pub fn has_voice(&self, voice: &str) -> bool {
        self.styles.has_voice(voice)
    }

    /// All available voice names in sorted order.
    pub fn list_voices(&self) -> Vec<&str> {
        self.styles.list_voices()
    }

    /// Synthesize audio from phoneme token ids.
    ///
    /// Sequences longer than [`MAX_PHONEME_LEN`] are split (preferring
    /// punctuation boundaries) and the pieces joined with a short
    /// crossfade. The style index is held at the full sequence length so a
    /// split does not change prosody between adjacent pieces.
    pub fn synthesize_ids(
        &mut self,
        ids: &[i64],
        voice: &str,
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let style_idx = ids.len();
        let chunks = split_chunks(ids);
        if chunks.len() > 1 {
            log::debug!(
                "phoneme sequence exceeded limit ({} > {MAX_PHONEME_LEN}), split into {} pieces",
                ids.len(),
                chunks.len()
            );
        }

        let mut combined = Vec::with_capacity(ids.len() * 300);
        for chunk in &chunks {
            let style = self.styles.style(voice, style_idx)?.to_vec();
            let audio = self.infer_chunk(chunk, &style, speed)?;
            if audio.is_empty() {
                continue;
            }
            if combined.is_empty() {
                combined.extend_from_slice(&audio);
            } else {
                append_with_crossfade(&mut combined, &audio, CHUNK_CROSSFADE_SAMPLES);
            }
        }

        Ok(combined)
    }

    /// Run ONNX inference on one chunk of token ids.
    fn infer_chunk(
        &mut self,
        tokens: &[i64],
        style: &[f32],
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        let seq_len = tokens.len() + 2; // +2 for padding tokens

        // Tokens tensor: [[0, t1..tN, 0]]
        let mut padded = vec![0i64; seq_len];
        padded[1..seq_len - 1].copy_from_slice(tokens);
        let tokens_arr = Array2::from_shape_vec((1, seq_len), padded)?;

        let style_view = ndarray::ArrayView2::from_shape((1, STYLE_DIM), style)?;

        let output = if self.speed_is_int32 {
            let speed_arr = ndarray::arr1(&[speed as i32]);
            let inputs = inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ];
            self.session.run(inputs)?
        } else {
            let speed_arr = ndarray::arr1(&[speed]);
            let inputs = inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ];
            self.session.run(inputs)?
        };

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("no output from model")))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        Ok(waveform.as_slice().unwrap_or(&[]).to_vec())
    }
}

/// Find the ONNX model file in the given directory.
///
/// Prefers `kokoro-quant-convinteger.onnx`, then any `.onnx` file found.
fn find_onnx_file(model_dir: &Path) -> Result<std::path::PathBuf, KokoroError> {
    let preferred = model_dir.join("kokoro-quant-convinteger.onnx");
    if preferred.exists() {
        return Ok(preferred);
    }

    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            log::info!("using ONNX file: {}", path.display());
            return Ok(path);
        }
    }

    Err(KokoroError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no .onnx file found in {}", model_dir.display()),
    )))
}

fn init_session(onnx_path: &Path, num_threads: Option<usize>) -> Result<Session, KokoroError> {
    let providers = vec![CPUExecutionProvider::default().build()];

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?
        .with_parallel_execution(true)?;

    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}

/// Detect the token input name ("input_ids" or "tokens") from session inputs.
fn detect_tokens_input(session: &Session) -> String {
    for input in session.inputs() {
        if input.name() == "input_ids" || input.name() == "tokens" {
            return input.name().to_string();
        }
    }
    "input_ids".to_string()
}

/// Detect whether the speed input expects int32 (true) or float32 (false).
fn detect_speed_type(session: &Session) -> bool {
    for input in session.inputs() {
        if input.name() == "speed" {
            let type_str = format!("{:?}", input.dtype());
            return type_str.contains("Int32") || type_str.contains("int32");
        }
    }
    // Modern Kokoro models use int32.
    true
}

/// Load the vocabulary from a config.json with a `"vocab"` field mapping
/// single-character strings to integer token ids.
fn load_vocab(config_path: &Path) -> Result<HashMap<char, i64>, KokoroError> {
    let content = std::fs::read_to_string(config_path)?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| KokoroError::Config(format!("failed to parse JSON: {e}")))?;

    let vocab_obj = json
        .get("vocab")
        .ok_or_else(|| KokoroError::Config("missing 'vocab' field".to_string()))?
        .as_object()
        .ok_or_else(|| KokoroError::Config("'vocab' must be an object".to_string()))?;

    let mut map = HashMap::new();
    for (k, v) in vocab_obj {
        let ch = k
            .chars()
            .next()
            .ok_or_else(|| KokoroError::Config(format!("empty key in vocab: {k:?}")))?;
        let id = v
            .as_i64()
            .ok_or_else(|| KokoroError::Config(format!("non-integer vocab value for key {k:?}")))?;
        map.insert(ch, id);
    }

    Ok(map)
}

/// Split phoneme ids into pieces of at most [`MAX_PHONEME_LEN`], preferring
/// to break after punctuation.
fn split_chunks(ids: &[i64]) -> Vec<Vec<i64>> {
    // Punctuation ids in the Kokoro vocab: ';':1 ':':2 ',':3 '.':4 '!':5 '?':6
    const PUNCT_IDS: &[i64] = &[1, 2, 3, 4, 5, 6];

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < ids.len() {
        let end = (start + MAX_PHONEME_LEN).min(ids.len());
        if end == ids.len() {
            chunks.push(ids[start..end].to_vec());
            break;
        }

        let split = ids[start..end]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &id)| PUNCT_IDS.contains(&id))
            .map(|(i, _)| start + i + 1)
            .unwrap_or(end);

        chunks.push(ids[start..split].to_vec());
        start = split;
    }

    chunks
}

fn append_with_crossfade(dst: &mut Vec<f32>, src: &[f32], crossfade_samples: usize) {
    let overlap = crossfade_samples.min(dst.len()).min(src.len());
    if overlap == 0 {
        dst.extend_from_slice(src);
        return;
    }

    let dst_start = dst.len() - overlap;
    for i in 0..overlap {
        let t = (i + 1) as f32 / (overlap as f32 + 1.0);
        dst[dst_start + i] = dst[dst_start + i] * (1.0 - t) + src[i] * t;
    }

    dst.extend_from_slice(&src[overlap..]);
}

#[cfg(test)]
mod tests {
    use super::{append_with_crossfade, load_vocab, split_chunks, MAX_PHONEME_LEN};

    #[test]
    fn short_sequences_stay_in_one_chunk() {
        let ids: Vec<i64> = (0..100).collect();
        let chunks = split_chunks(&ids);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], ids);
    }

    #[test]
    fn long_sequences_split_after_punctuation() {
        // A full-stop (id 4) sits inside the first window; the split should
        // land right after it.
        let mut ids = vec![43i64; 400];
        ids.push(4);
        ids.extend(std::iter::repeat(43).take(300));

        let chunks = split_chunks(&ids);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 401);
        assert_eq!(*chunks[0].last().unwrap(), 4);
        assert_eq!(chunks[1].len(), 300);
    }

    #[test]
    fn chunks_never_exceed_the_phoneme_limit() {
        let ids = vec![43i64; MAX_PHONEME_LEN * 3 + 17];
        let chunks = split_chunks(&ids);
        assert!(chunks.iter().all(|c| c.len() <= MAX_PHONEME_LEN));
        assert_eq!(chunks.iter().map(Vec::len).sum::<usize>(), ids.len());
    }

    #[test]
    fn crossfade_overlaps_instead_of_appending() {
        let mut dst = vec![1.0f32; 100];
        append_with_crossfade(&mut dst, &[0.0f32; 100], 10);
        // 100 + 100 - 10 overlapping samples
        assert_eq!(dst.len(), 190);
        // Inside the overlap the signal ramps from dst toward src.
        assert!(dst[90] < 1.0 && dst[90] > 0.0);
    }

    #[test]
    fn crossfade_degenerates_to_append_for_empty_dst() {
        let mut dst = Vec::new();
        append_with_crossfade(&mut dst, &[0.5f32; 4], 240);
        assert_eq!(dst, vec![0.5f32; 4]);
    }

    #[test]
    fn vocab_loads_from_config_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"vocab": {"a": 43, ".": 4}}"#).expect("write");

        let vocab = load_vocab(&path).expect("load");
        assert_eq!(vocab.get(&'a'), Some(&43));
        assert_eq!(vocab.get(&'.'), Some(&4));
    }

    #[test]
    fn vocab_without_the_field_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"sample_rate": 24000}"#).expect("write");
        assert!(load_vocab(&path).is_err());
    }
}
