//! Composition engine: flattens an ordered layer stack into one image.

pub(crate) mod compose;
pub(crate) mod raster;
