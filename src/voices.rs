//! The voice registry: which voice names exist and where their weights live.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Curated voice list used when no weight directory is available.
const CURATED_VOICES: &[&str] = &[
    "af_heart", "af_alloy", "af_aoede", "af_bella", "am_adam",
    "bf_alice", "bf_emma", "bm_daniel", "bm_george",
    "jf_alpha", "jm_kumo", "zf_xiaobei", "zm_yunjian",
    "ef_dora", "em_alex", "ff_siwis", "hf_alpha", "hm_omega",
    "if_sara", "im_nicola", "pf_dora", "pm_santa",
];

/// Weight-file extensions recognized by the directory scan.
const WEIGHT_EXTENSIONS: &[&str] = &["pt", "bin"];

/// Available voice identifiers, optionally with per-voice weight paths.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    names: Vec<String>,
    weights: HashMap<String, PathBuf>,
}

impl VoiceCatalog {
    /// The built-in curated list.
    pub fn curated() -> Self {
        Self::from_names(CURATED_VOICES.iter().map(|s| s.to_string()))
    }

    /// Build a catalog from names an engine reported.
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort_unstable();
        names.dedup();
        Self {
            names,
            weights: HashMap::new(),
        }
    }

    /// Scan a directory of per-voice weight files (`af_bella.pt`,
    /// `bf_emma.bin`, …); the file stem is the voice name.
    pub fn scan(dir: &Path) -> std::io::Result<Self> {
        let mut names = Vec::new();
        let mut weights = HashMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_weight = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| WEIGHT_EXTENSIONS.contains(&ext));
            if !is_weight {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
                weights.insert(stem.to_string(), path.clone());
            }
        }

        names.sort_unstable();
        log::info!("found {} voice(s) in {}", names.len(), dir.display());
        Ok(Self { names, weights })
    }

    /// All voice names in sorted order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, voice: &str) -> bool {
        self.names.iter().any(|n| n == voice)
    }

    /// Weight file for a scanned voice; `None` for curated or
    /// engine-reported catalogs.
    pub fn weight_path(&self, voice: &str) -> Option<&Path> {
        self.weights.get(voice).map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::VoiceCatalog;

    #[test]
    fn curated_catalog_has_the_default_voices() {
        let catalog = VoiceCatalog::curated();
        assert!(!catalog.is_empty());
        assert!(catalog.contains("af_heart"));
        assert!(catalog.contains("af_bella"));
        assert!(!catalog.contains("xx_mystery"));
    }

    #[test]
    fn scan_picks_up_weight_files_and_ignores_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("bf_alice.pt"), b"w").expect("write");
        std::fs::write(dir.path().join("af_bella.bin"), b"w").expect("write");
        std::fs::write(dir.path().join("README.txt"), b"docs").expect("write");

        let catalog = VoiceCatalog::scan(dir.path()).expect("scan");
        assert_eq!(catalog.names(), ["af_bella", "bf_alice"]);
        assert!(catalog
            .weight_path("bf_alice")
            .is_some_and(|p| p.ends_with("bf_alice.pt")));
        assert!(catalog.weight_path("README").is_none());
    }

    #[test]
    fn from_names_sorts_and_dedups() {
        let catalog = VoiceCatalog::from_names(
            ["bf_emma", "af_heart", "bf_emma"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(catalog.names(), ["af_heart", "bf_emma"]);
        assert!(catalog.weight_path("af_heart").is_none());
    }
}
