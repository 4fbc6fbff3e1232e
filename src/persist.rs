//! Writing generated audio to disk, with retry and optional transcoding.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::audio::AudioBuffer;
use crate::error::GenerationError;

/// Fixed bitrate for compressed output formats.
const TRANSCODE_BITRATE: &str = "192k";

/// Retry behavior for the WAV write.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total write attempts, including the first.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Write the buffer as canonical WAV, retrying on transient failure.
///
/// The usual transient cause is the target file being held open by another
/// program (a media player replaying the last output); each failed attempt
/// is logged with its number and retried after the policy's delay. Once the
/// attempts are exhausted the last error is returned.
pub fn write_wav_with_retry(
    buffer: &AudioBuffer,
    path: &Path,
    policy: &RetryPolicy,
) -> Result<(), GenerationError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match try_write(buffer, path) {
            Ok(()) => {
                log::info!(
                    "audio saved to {} ({} samples, {:.2}s)",
                    path.display(),
                    buffer.samples.len(),
                    buffer.duration_secs()
                );
                return Ok(());
            }
            Err(err) if attempt < policy.max_attempts => {
                log::warn!(
                    "could not save audio (attempt {attempt}/{}): {err}; \
                     the file may be open in another program, retrying in {:?}",
                    policy.max_attempts,
                    policy.delay
                );
                std::thread::sleep(policy.delay);
            }
            Err(source) => {
                log::error!(
                    "could not save audio after {attempt} attempts: {source}"
                );
                return Err(GenerationError::Persistence {
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

fn try_write(buffer: &AudioBuffer, path: &Path) -> Result<(), hound::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(hound::Error::IoError)?;
    }
    buffer.write_wav(path)
}

/// Result of a transcode request.
#[derive(Debug, Clone)]
pub struct TranscodeOutcome {
    /// File to hand to the caller. On any degraded path this is the
    /// untranscoded WAV.
    pub path: PathBuf,
    /// True when the requested format could not be produced.
    pub degraded: bool,
}

/// Convert the canonical WAV to the requested format.
///
/// `"wav"` is a no-op. `"mp3"` and `"aac"` shell out to ffmpeg at a fixed
/// 192k bitrate. Anything else — and any codec failure — degrades to the
/// canonical WAV with a logged warning instead of failing the generation.
pub fn transcode(wav_path: &Path, format: &str) -> TranscodeOutcome {
    match format {
        "wav" => TranscodeOutcome {
            path: wav_path.to_path_buf(),
            degraded: false,
        },
        "mp3" | "aac" => {
            let target = wav_path.with_extension(format);
            match run_ffmpeg(wav_path, &target, format) {
                Ok(()) => {
                    log::info!("transcoded to {}", target.display());
                    TranscodeOutcome {
                        path: target,
                        degraded: false,
                    }
                }
                Err(err) => {
                    log::warn!("transcode to {format} failed, keeping WAV: {err}");
                    TranscodeOutcome {
                        path: wav_path.to_path_buf(),
                        degraded: true,
                    }
                }
            }
        }
        other => {
            log::warn!("unrecognized output format '{other}', keeping WAV");
            TranscodeOutcome {
                path: wav_path.to_path_buf(),
                degraded: true,
            }
        }
    }
}

fn run_ffmpeg(input: &Path, output: &Path, format: &str) -> Result<(), String> {
    let codec = match format {
        "mp3" => "libmp3lame",
        "aac" => "aac",
        other => return Err(format!("no codec configured for '{other}'")),
    };

    let result = Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .args(["-codec:a", codec, "-b:a", TRANSCODE_BITRATE, "-y"])
        .arg(output)
        .output()
        .map_err(|e| format!("ffmpeg could not be run: {e}"))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(format!(
            "ffmpeg exited with {:?}: {}",
            result.status.code(),
            stderr.lines().last().unwrap_or("")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{transcode, write_wav_with_retry, RetryPolicy};
    use crate::audio::AudioBuffer;
    use crate::error::GenerationError;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn writes_on_the_first_attempt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.wav");
        let buffer = AudioBuffer::new(vec![0.25; 480], 24000);

        write_wav_with_retry(&buffer, &path, &fast_policy()).expect("write");

        let reader = hound::WavReader::open(&path).expect("open written wav");
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 480);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("outputs").join("nested").join("out.wav");
        let buffer = AudioBuffer::new(vec![0.0; 24], 24000);

        write_wav_with_retry(&buffer, &path, &fast_policy()).expect("write");
        assert!(path.exists());
    }

    #[test]
    fn exhausts_every_attempt_before_failing() {
        let dir = tempfile::tempdir().expect("tempdir");
        // The target is a directory, so every attempt fails the same way.
        let buffer = AudioBuffer::new(vec![0.0; 24], 24000);

        match write_wav_with_retry(&buffer, dir.path(), &fast_policy()) {
            Err(GenerationError::Persistence { attempts, .. }) => assert_eq!(attempts, 3),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(()) => panic!("write into a directory should fail"),
        }
    }

    #[test]
    fn wav_transcode_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let wav = dir.path().join("out.wav");

        let outcome = transcode(&wav, "wav");
        assert!(!outcome.degraded);
        assert_eq!(outcome.path, wav);
    }

    #[test]
    fn unrecognized_format_degrades_to_the_wav_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let wav = dir.path().join("out.wav");

        let outcome = transcode(&wav, "ogg");
        assert!(outcome.degraded);
        assert_eq!(outcome.path, wav);
    }
}
