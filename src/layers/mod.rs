//! Layer sources, selection strategies and the per-unit selection assembler.

pub(crate) mod assemble;
pub(crate) mod selector;
pub(crate) mod source;

use std::ffi::{OsStr, OsString};

use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::render::raster::PremulImage;

/// One decoded pick from a [`source::LayerSource`].
#[derive(Clone, Debug)]
pub struct Layer {
    /// Exact file name of the picked item; compositions are keyed on this.
    pub id: OsString,
    /// Printable form of `id`, used in notices and logs.
    pub name: String,
    /// Decoded, premultiplied pixels.
    pub pixels: PremulImage,
}

impl Layer {
    pub fn new(id: impl Into<OsString>, pixels: PremulImage) -> Self {
        let id = id.into();
        let name = id.to_string_lossy().into_owned();
        Self { id, name, pixels }
    }
}

/// Ordered layer stack for one unit: index 0 is the bottom.
#[derive(Clone, Debug)]
pub struct Composition {
    layers: Vec<Layer>,
}

impl Composition {
    /// Build a composition from layers in source order. At least one layer is required.
    pub fn new(layers: Vec<Layer>) -> LayerstackResult<Self> {
        if layers.is_empty() {
            return Err(LayerstackError::validation(
                "a composition needs at least one layer",
            ));
        }
        Ok(Self { layers })
    }

    /// Layers, bottom first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer names, bottom first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    /// Exact layer file names, bottom first.
    pub fn ids(&self) -> impl Iterator<Item = &OsStr> {
        self.layers.iter().map(|l| l.id.as_os_str())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
