//! Voice-to-engine routing and the shared engine registry.
//!
//! A voice name's two-character prefix selects the engine key (one key per
//! language family). The registry caches one constructed engine per key for
//! the life of the process: construction loads model weights and is far too
//! expensive to repeat per request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::engine::{EngineError, SpeechEngine};
use crate::error::GenerationError;

/// Key used when a voice prefix is not recognized (American English, the
/// most common voice family).
pub const DEFAULT_ENGINE_KEY: &str = "a";

/// Map a voice name to its engine key.
///
/// Voice names follow the pattern `{prefix}_{name}` where the two-character
/// prefix encodes the language. Unknown prefixes fall back to
/// [`DEFAULT_ENGINE_KEY`] rather than failing.
pub fn engine_key(voice: &str) -> &'static str {
    let prefix = voice.get(..2).unwrap_or("").to_ascii_lowercase();
    match prefix.as_str() {
        "af" | "am" => "a",
        "bf" | "bm" => "b",
        "ef" | "em" => "e",
        "ff" => "f",
        "hf" | "hm" => "h",
        "if" | "im" => "i",
        "jf" | "jm" => "j",
        "pf" | "pm" => "p",
        "zf" | "zm" => "z",
        _ => DEFAULT_ENGINE_KEY,
    }
}

/// An engine handle shared across requests for one key.
pub type SharedEngine = Arc<Mutex<Box<dyn SpeechEngine>>>;

/// Constructs an engine for a key on first use. The factory may capture a
/// pre-loaded underlying model and share it across keys to conserve memory.
pub type EngineFactory =
    Box<dyn Fn(&'static str) -> Result<Box<dyn SpeechEngine>, EngineError> + Send + Sync>;

type EngineCell = Arc<Mutex<Option<SharedEngine>>>;

/// Keyed registry of lazily constructed speech engines.
///
/// Owned by the session and passed in explicitly; there is no ambient
/// process-global state. First-time construction for a key is serialized by
/// a per-key guard, so concurrent requests never load the same engine
/// twice, and construction for one key does not block other keys.
pub struct EngineRegistry {
    cells: Mutex<HashMap<&'static str, EngineCell>>,
    factory: EngineFactory,
}

impl EngineRegistry {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&'static str) -> Result<Box<dyn SpeechEngine>, EngineError> + Send + Sync + 'static,
    {
        Self {
            cells: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    /// Return the engine handling `voice`, constructing it on first use.
    ///
    /// A failed construction is not cached: the key's slot stays empty and
    /// the next request for it runs the factory again.
    pub fn resolve(&self, voice: &str) -> Result<SharedEngine, GenerationError> {
        let key = engine_key(voice);
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            cells.entry(key).or_default().clone()
        };

        let mut slot = cell.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        log::info!("constructing engine for key '{key}' (voice '{voice}')");
        let engine = (self.factory)(key)
            .map_err(|source| GenerationError::EngineConstruction { key, source })?;
        let shared: SharedEngine = Arc::new(Mutex::new(engine));
        *slot = Some(Arc::clone(&shared));
        Ok(shared)
    }

    /// Keys with a constructed engine, in no particular order.
    pub fn loaded_keys(&self) -> Vec<&'static str> {
        let cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells
            .iter()
            .filter(|(_, cell)| {
                cell.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .map(|(key, _)| *key)
            .collect()
    }

    /// Release every cached engine, best effort.
    ///
    /// Order-independent; a failure to release one engine is logged and
    /// does not stop the others. Never panics, even over poisoned locks.
    pub fn shutdown(&self) {
        let cells = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *cells)
        };

        let mut released = 0usize;
        for (key, cell) in cells {
            let mut slot = cell.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(engine) = slot.take() {
                engine
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .release();
                released += 1;
                log::debug!("released engine for key '{key}'");
            }
        }
        if released > 0 {
            log::info!("released {released} engine(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{engine_key, EngineRegistry, DEFAULT_ENGINE_KEY};
    use crate::engine::{EngineError, InvocationSpec, Segment, SegmentStream, SpeechEngine};
    use crate::error::GenerationError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NullEngine;

    impl SpeechEngine for NullEngine {
        fn invoke(&mut self, _spec: InvocationSpec) -> Result<SegmentStream, EngineError> {
            Ok(Box::new(std::iter::empty::<Result<Segment, EngineError>>()))
        }
    }

    fn counting_registry() -> (EngineRegistry, Arc<AtomicUsize>) {
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&constructions);
        let registry = EngineRegistry::new(move |_key| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullEngine) as Box<dyn SpeechEngine>)
        });
        (registry, constructions)
    }

    #[test]
    fn recognized_prefixes_map_to_their_key() {
        assert_eq!(engine_key("af_heart"), "a");
        assert_eq!(engine_key("am_adam"), "a");
        assert_eq!(engine_key("bm_george"), "b");
        assert_eq!(engine_key("ff_siwis"), "f");
        assert_eq!(engine_key("jf_alpha"), "j");
        assert_eq!(engine_key("zf_xiaobei"), "z");
        assert_eq!(engine_key("pm_santa"), "p");
    }

    #[test]
    fn unknown_prefixes_fall_back_to_the_default_key() {
        assert_eq!(engine_key("xx_mystery"), DEFAULT_ENGINE_KEY);
        assert_eq!(engine_key(""), DEFAULT_ENGINE_KEY);
        assert_eq!(engine_key("q"), DEFAULT_ENGINE_KEY);
    }

    #[test]
    fn construction_runs_at_most_once_per_key() {
        let (registry, constructions) = counting_registry();

        let first = registry.resolve("af_heart").expect("resolve af");
        let second = registry.resolve("am_adam").expect("resolve am");
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));

        registry.resolve("bf_alice").expect("resolve bf");
        assert_eq!(constructions.load(Ordering::SeqCst), 2);
        assert_eq!(registry.loaded_keys().len(), 2);
    }

    #[test]
    fn fallback_voices_share_the_default_engine() {
        let (registry, constructions) = counting_registry();

        let known = registry.resolve("af_heart").expect("resolve known");
        let unknown = registry.resolve("xx_mystery").expect("resolve unknown");
        assert!(Arc::ptr_eq(&known, &unknown));
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_construction_surfaces_and_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let registry = EngineRegistry::new(move |_key| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::Runtime("weights missing".to_string()))
        });

        for _ in 0..2 {
            match registry.resolve("af_heart") {
                Err(GenerationError::EngineConstruction { key, .. }) => assert_eq!(key, "a"),
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("expected construction error"),
            }
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(registry.loaded_keys().is_empty());
    }

    #[test]
    fn shutdown_clears_cached_engines() {
        let (registry, _) = counting_registry();
        registry.resolve("af_heart").expect("resolve");
        registry.shutdown();
        assert!(registry.loaded_keys().is_empty());
    }
}
