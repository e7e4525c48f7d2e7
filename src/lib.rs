//! Layerstack generates a batch of unique layered images.
//!
//! Each unit picks one file from every layer directory, stacks the picks in directory order
//! with alpha compositing, and writes the result as `<index>.png`. Repeated combinations are
//! detected by their ordered layer names and skipped instead of being rendered or written again.
//!
//! - Build a [`GenerateConfig`] (or [`LayerSource`]s plus [`GenerateOpts`])
//! - Create a [`GenerateSession`] or call [`generate`]
//! - Inspect the returned [`GenerateReport`]
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod cache;
pub mod config;
pub(crate) mod generate;
pub(crate) mod layers;
pub(crate) mod persist;
pub(crate) mod render;

pub use crate::cache::dedup::{CacheOutcome, DedupCache};
pub use crate::cache::key::{CompositionKey, key_of};
pub use crate::config::{FailurePolicy, GenerateConfig, prepare_output_dir};
pub use crate::foundation::error::{LayerstackError, LayerstackResult, panic_message};
pub use crate::generate::{
    DuplicateNotice, GenerateOpts, GenerateReport, GenerateSession, UnitFailure, generate,
};
pub use crate::layers::assemble::select_layers;
pub use crate::layers::selector::{CyclingSelector, RandomSelector, Selector};
pub use crate::layers::source::{LayerSource, decode_layer_file};
pub use crate::layers::{Composition, Layer};
pub use crate::persist::pool::{Completion, PersistOpts, PersistPool};
pub use crate::persist::store::{ImageStore, InMemoryStore, PngDirStore};
pub use crate::render::compose::{PremulRgba8, compose, over, over_at_origin};
pub use crate::render::raster::{CompositeImage, PremulImage};
