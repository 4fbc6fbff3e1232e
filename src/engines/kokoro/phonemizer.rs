//! Grapheme-to-phoneme conversion via the espeak-ng CLI.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::model::KokoroError;

/// Location of a bundled espeak-ng install.
///
/// With the defaults the binary is taken from PATH and the data directory
/// from the system install.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

/// espeak-ng language code for an engine key.
pub fn espeak_lang(key: &str) -> &'static str {
    match key {
        "a" => "en-us",
        "b" => "en-gb",
        "e" => "es",
        "f" => "fr",
        "h" => "hi",
        "i" => "it",
        "j" => "ja",
        "p" => "pt-br",
        "z" => "cmn",
        _ => "en-us",
    }
}

/// Convert one text segment to an IPA phoneme string.
pub fn phonemize(text: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let output = run_espeak(text, lang, espeak)?;
    let ipa: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    Ok(ipa.join(" "))
}

/// Map IPA characters to Kokoro token ids.
///
/// Characters not in the vocab are silently dropped, matching the model's
/// reference tokenizer; espeak's `_` pause markers are skipped.
pub fn ipa_to_ids(ipa: &str, vocab: &HashMap<char, i64>) -> Vec<i64> {
    ipa.chars()
        .filter(|&ch| ch != '_')
        .filter_map(|ch| vocab.get(&ch).copied())
        .collect()
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let bin: &std::path::Path = espeak
        .bin_path
        .as_deref()
        .unwrap_or_else(|| std::path::Path::new("espeak-ng"));

    let mut command = Command::new(bin);
    command.args(["--ipa", "--stdin", "-q", "-v", lang]);
    if let Some(data) = &espeak.data_path {
        command.arg("--path").arg(data);
    }

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KokoroError::EspeakNotFound
            } else {
                KokoroError::Io(e)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // espeak-ng treats stdin as line-oriented input; without a final
        // line terminator the last token can be under-processed.
        let payload = canonicalize_stdin_payload(input);
        stdin.write_all(payload.as_bytes()).map_err(KokoroError::Io)?;
    }

    let output = child.wait_with_output().map_err(KokoroError::Io)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KokoroError::Phonemizer(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn canonicalize_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}
