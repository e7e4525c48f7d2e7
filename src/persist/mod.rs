//! Output stores and the bounded pool that writes composites off the control thread.

pub(crate) mod pool;
pub(crate) mod store;
