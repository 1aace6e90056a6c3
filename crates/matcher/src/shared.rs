use std::sync::{Arc, RwLock};

use index::ArtifactPaths;
use tracing::{info, warn};

use crate::engine::SearchEngine;
use crate::types::MatchError;

/// Hot-swappable handle to the engine currently serving queries.
///
/// Readers take a cheap `Arc` clone and query without holding the lock, so a
/// swap never waits on in-flight searches and never interrupts them.
pub struct SharedEngine {
    inner: RwLock<Arc<SearchEngine>>,
}

impl SharedEngine {
    pub fn new(engine: SearchEngine) -> Self {
        Self {
            inner: RwLock::new(Arc::new(engine)),
        }
    }

    /// The engine to use for the next query.
    pub fn current(&self) -> Arc<SearchEngine> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the serving engine, returning the previous one.
    pub fn swap(&self, engine: SearchEngine) -> Arc<SearchEngine> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, Arc::new(engine))
    }

    /// Load a fresh artifact triple with the current embedder and swap it in.
    ///
    /// The new triple is loaded and validated completely before the swap. On
    /// error the current engine keeps serving.
    pub fn reload(&self, locations: &ArtifactPaths) -> Result<Arc<SearchEngine>, MatchError> {
        let embedder = self.current().embedder().clone();
        match SearchEngine::open(embedder, locations) {
            Ok(engine) => {
                let rows = engine.len();
                let previous = self.swap(engine);
                info!(rows, previous_rows = previous.len(), "index reloaded");
                Ok(previous)
            }
            Err(err) => {
                warn!(error = %err, "index reload failed; keeping current index");
                Err(err)
            }
        }
    }
}
