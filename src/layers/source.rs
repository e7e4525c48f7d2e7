use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::layers::Layer;
use crate::layers::selector::Selector;
use crate::render::raster::PremulImage;

/// A directory of candidate layer files, indexed once and immutable for the run.
#[derive(Clone, Debug)]
pub struct LayerSource {
    dir: PathBuf,
    entries: Vec<PathBuf>,
}

impl LayerSource {
    /// Index the non-directory entries of `dir`, sorted by file name.
    ///
    /// Fails with [`LayerstackError::EmptySource`] when nothing is eligible, so an unusable
    /// source is rejected before any unit is generated.
    pub fn scan(dir: impl AsRef<Path>) -> LayerstackResult<Self> {
        let dir = dir.as_ref();
        let read = std::fs::read_dir(dir).map_err(|e| LayerstackError::source_access(dir, e))?;

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| LayerstackError::source_access(dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            entries.push(path);
        }
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if entries.is_empty() {
            return Err(LayerstackError::EmptySource(dir.to_path_buf()));
        }
        tracing::debug!(dir = %dir.display(), layers = entries.len(), "indexed layer source");
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    /// Directory this source was scanned from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate files, sorted by file name.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read and decode the candidate at `idx`.
    pub fn read_layer(&self, idx: usize) -> LayerstackResult<Layer> {
        let path = self.entries.get(idx).ok_or_else(|| {
            LayerstackError::internal(format!(
                "layer index {idx} out of range for '{}' ({} entries)",
                self.dir.display(),
                self.entries.len()
            ))
        })?;
        let id = path.file_name().map(OsStr::to_os_string).unwrap_or_default();
        let pixels = decode_layer_file(path)?;
        Ok(Layer::new(id, pixels))
    }

    /// Pick one candidate through `selector` and decode it.
    pub fn read_random(&self, selector: &mut dyn Selector) -> LayerstackResult<Layer> {
        if self.entries.is_empty() {
            return Err(LayerstackError::EmptySource(self.dir.clone()));
        }
        let idx = selector.choose(self, self.entries.len());
        self.read_layer(idx)
    }
}

/// Decode any raster format `image` recognises by content into premultiplied RGBA8.
pub fn decode_layer_file(path: &Path) -> LayerstackResult<PremulImage> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| LayerstackError::source_access(path, e))?
        .with_guessed_format()
        .map_err(|e| LayerstackError::source_access(path, e))?;
    let decoded = reader
        .decode()
        .map_err(|e| LayerstackError::decode(path, e))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();
    premultiply_rgba8_in_place(&mut data);

    PremulImage::from_premul(width, height, data).ok_or_else(|| {
        LayerstackError::internal(format!(
            "decoded '{}' does not match its {width}x{height} size",
            path.display()
        ))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/layers/source.rs"]
mod tests;
