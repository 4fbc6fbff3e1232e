//! Audio sample buffers and in-order concatenation.

use std::path::Path;

use crate::error::GenerationError;

/// A buffer of mono f32 audio samples at a fixed sample rate.
///
/// This is the canonical intermediate representation: every segment the
/// engine produces is converted into one of these before accumulation, and
/// the concatenated result is what gets written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Raw audio samples as f32 values.
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for Kokoro).
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Concatenate accumulated segment buffers in order.
///
/// A single buffer is returned by move, unchanged. Zero buffers means the
/// generation produced no usable audio and is reported as
/// [`GenerationError::EmptyResult`]. Buffers with differing sample rates are
/// rejected rather than silently resampled.
pub fn concatenate(buffers: Vec<AudioBuffer>) -> Result<AudioBuffer, GenerationError> {
    let mut buffers = buffers.into_iter();

    let mut combined = match buffers.next() {
        None => return Err(GenerationError::EmptyResult),
        Some(first) => first,
    };

    let total: usize = buffers.as_slice().iter().map(|b| b.samples.len()).sum();
    combined.samples.reserve(total);

    for buffer in buffers {
        if buffer.sample_rate != combined.sample_rate {
            return Err(GenerationError::SampleRateMismatch {
                expected: combined.sample_rate,
                found: buffer.sample_rate,
            });
        }
        combined.samples.extend_from_slice(&buffer.samples);
    }

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::{concatenate, AudioBuffer};
    use crate::error::GenerationError;

    #[test]
    fn empty_input_is_an_empty_result_error() {
        assert!(matches!(
            concatenate(vec![]),
            Err(GenerationError::EmptyResult)
        ));
    }

    #[test]
    fn single_buffer_is_returned_unchanged() {
        let buffer = AudioBuffer::new(vec![0.1, -0.2, 0.3], 24000);
        let result = concatenate(vec![buffer.clone()]).expect("single buffer concat");
        assert_eq!(result, buffer);
    }

    #[test]
    fn two_buffers_concatenate_in_order() {
        let first = AudioBuffer::new(vec![0.1, 0.2], 24000);
        let second = AudioBuffer::new(vec![0.3, 0.4, 0.5], 24000);
        let result = concatenate(vec![first.clone(), second.clone()]).expect("concat");

        assert_eq!(result.samples.len(), first.samples.len() + second.samples.len());
        assert_eq!(&result.samples[..2], &first.samples[..]);
        assert_eq!(&result.samples[2..], &second.samples[..]);
        assert_eq!(result.sample_rate, 24000);
    }

    #[test]
    fn mismatched_sample_rates_are_rejected() {
        let a = AudioBuffer::new(vec![0.0; 10], 24000);
        let b = AudioBuffer::new(vec![0.0; 10], 22050);
        assert!(matches!(
            concatenate(vec![a, b]),
            Err(GenerationError::SampleRateMismatch {
                expected: 24000,
                found: 22050
            })
        ));
    }

    #[test]
    fn duration_reflects_sample_count_and_rate() {
        let buffer = AudioBuffer::new(vec![0.0; 48000], 24000);
        assert!((buffer.duration_secs() - 2.0).abs() < f64::EPSILON);
    }
}
