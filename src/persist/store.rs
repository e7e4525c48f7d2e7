use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::render::raster::CompositeImage;

/// Destination for accepted composites.
///
/// `persist` is called from persistence worker threads, at most once per unit index and in no
/// particular order.
pub trait ImageStore: Send + Sync {
    /// Durably write the composite of unit `index` (1-based).
    fn persist(&self, index: u32, image: &CompositeImage) -> LayerstackResult<()>;
}

/// Writes `<index>.png` files into one directory.
#[derive(Clone, Debug)]
pub struct PngDirStore {
    dir: PathBuf,
}

impl PngDirStore {
    /// Store into `dir`, which must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output path for unit `index`.
    pub fn path_for(&self, index: u32) -> PathBuf {
        self.dir.join(format!("{index}.png"))
    }
}

impl ImageStore for PngDirStore {
    fn persist(&self, index: u32, image: &CompositeImage) -> LayerstackResult<()> {
        let path = self.path_for(index);
        let straight = image.to_straight_rgba8();
        image::save_buffer_with_format(
            &path,
            &straight,
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| LayerstackError::persistence(format!("write png '{}': {e}", path.display())))?;
        tracing::debug!(unit = index, path = %path.display(), "persisted composite");
        Ok(())
    }
}

/// In-memory store for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    images: Mutex<Vec<(u32, CompositeImage)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured `(index, image)` pairs sorted by index.
    pub fn images(&self) -> Vec<(u32, CompositeImage)> {
        let mut out = match self.images.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        out.sort_by_key(|(i, _)| *i);
        out
    }

    /// Captured unit indices, sorted.
    pub fn indices(&self) -> Vec<u32> {
        self.images().into_iter().map(|(i, _)| i).collect()
    }
}

impl ImageStore for InMemoryStore {
    fn persist(&self, index: u32, image: &CompositeImage) -> LayerstackResult<()> {
        self.images
            .lock()
            .map_err(|_| LayerstackError::persistence("in-memory store lock poisoned"))?
            .push((index, image.clone()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/persist/store.rs"]
mod tests;
