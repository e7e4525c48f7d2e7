//! Deduplication cache keyed by the ordered layer names of a composition.

pub(crate) mod dedup;
pub(crate) mod key;
