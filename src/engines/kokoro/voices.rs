//! Voice style vectors, loaded from the `.npz` voice archive.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::{KokoroError, STYLE_DIM};

/// All loaded voice styles.
///
/// Each voice stores its style vectors flat (`N * STYLE_DIM` floats); the
/// vector index corresponds to the phoneme token count, which keeps prosody
/// consistent with sequence length.
pub struct StyleStore {
    voices: HashMap<String, Vec<f32>>,
}

impl StyleStore {
    /// Load every voice from a `.npz` (numpy zip) archive where each entry
    /// is a `.npy` file named after the voice (e.g. `af_heart.npy`).
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let file = File::open(path)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| KokoroError::VoiceParse(format!("failed to open zip archive: {e}")))?;

        let mut voices = HashMap::new();
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| KokoroError::VoiceParse(format!("failed to read zip entry {i}: {e}")))?;

            let raw_name = entry.name().to_string();
            let voice_name = raw_name
                .trim_end_matches('/')
                .trim_end_matches(".npy")
                .to_string();
            if voice_name.is_empty() || raw_name.ends_with('/') {
                continue;
            }

            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| KokoroError::VoiceParse(format!("failed to read {raw_name}: {e}")))?;

            voices.insert(voice_name, parse_npy(&data, &raw_name)?);
        }

        log::info!("loaded {} voices", voices.len());
        Ok(Self { voices })
    }

    /// Style vector for a voice at the given index, clamped to the valid
    /// range so any index is safe.
    pub fn style(&self, voice: &str, idx: usize) -> Result<&[f32], KokoroError> {
        let styles = self
            .voices
            .get(voice)
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;

        let entries = styles.len() / STYLE_DIM;
        let clamped = idx.min(entries.saturating_sub(1));
        Ok(&styles[clamped * STYLE_DIM..(clamped + 1) * STYLE_DIM])
    }

    pub fn has_voice(&self, voice: &str) -> bool {
        self.voices.contains_key(voice)
    }

    /// All voice names in sorted order.
    pub fn list_voices(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse a numpy `.npy` payload into a flat f32 vector.
///
/// Expects a little-endian float32 array whose length is a multiple of
/// [`STYLE_DIM`] (shape `[N, STYLE_DIM]`).
fn parse_npy(data: &[u8], name: &str) -> Result<Vec<f32>, KokoroError> {
    if data.len() < 10 {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: file too short ({} bytes)",
            data.len()
        )));
    }
    if &data[0..6] != b"\x93NUMPY" {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: invalid numpy magic bytes"
        )));
    }

    // major version at [6], minor at [7], header_len at [8..10] (LE u16)
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let data_offset = 10 + header_len;
    if data.len() < data_offset {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: header truncated (need {data_offset} bytes, got {})",
            data.len()
        )));
    }

    let float_data = &data[data_offset..];
    if float_data.len() % 4 != 0 {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: float data length {} is not a multiple of 4",
            float_data.len()
        )));
    }

    let floats: Vec<f32> = float_data
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    if floats.is_empty() || floats.len() % STYLE_DIM != 0 {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: float count {} is not a positive multiple of {STYLE_DIM}",
            floats.len()
        )));
    }

    Ok(floats)
}
