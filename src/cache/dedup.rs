use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::key::{CompositionKey, key_of};
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::layers::Composition;
use crate::render::raster::CompositeImage;

/// Result of consulting the cache for one composition.
#[derive(Debug)]
pub enum CacheOutcome {
    /// First occurrence: the composite was rendered and stored; it must be persisted.
    Miss {
        /// Key the composite was stored under.
        key: CompositionKey,
        /// Freshly rendered composite.
        image: Arc<CompositeImage>,
    },
    /// Repeat of an earlier combination: nothing to persist.
    Hit {
        /// Key of the existing entry.
        key: CompositionKey,
    },
}

/// Run-scoped map from composition key to rendered composite. Never evicts.
///
/// Only the control thread touches it; persistence workers receive `Arc` clones.
#[derive(Debug, Default)]
pub struct DedupCache {
    entries: HashMap<CompositionKey, Arc<CompositeImage>>,
    renders: u64,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only probe.
    pub fn lookup(&self, key: &CompositionKey) -> Option<Arc<CompositeImage>> {
        self.entries.get(key).cloned()
    }

    /// Insert a composite for a key that missed. Overwriting is a logic error.
    pub fn store(
        &mut self,
        key: CompositionKey,
        image: Arc<CompositeImage>,
    ) -> LayerstackResult<()> {
        if self.entries.contains_key(&key) {
            return Err(LayerstackError::internal(format!(
                "dedup cache already holds combination {key}"
            )));
        }
        self.entries.insert(key, image);
        Ok(())
    }

    /// Look the composition up, rendering and storing it through `render` on a miss.
    ///
    /// `render` runs at most once per distinct key over the cache's lifetime.
    pub fn resolve(
        &mut self,
        composition: &Composition,
        render: impl FnOnce(&Composition) -> CompositeImage,
    ) -> LayerstackResult<CacheOutcome> {
        let key = key_of(composition);
        if self.entries.contains_key(&key) {
            return Ok(CacheOutcome::Hit { key });
        }

        let image = Arc::new(render(composition));
        self.renders += 1;
        self.store(key.clone(), image.clone())?;
        Ok(CacheOutcome::Miss { key, image })
    }

    /// Number of distinct combinations stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many times `resolve` invoked its renderer.
    pub fn renders(&self) -> u64 {
        self.renders
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/dedup.rs"]
mod tests;
