use std::ffi::OsString;
use std::fmt;

use crate::layers::Composition;

/// Identity of a composition: its ordered layer file names.
///
/// Keys compare the name sequence element-wise on the exact file names, so neither names
/// containing the display separator nor names that only differ in non-UTF-8 bytes can collide
/// with a different sequence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositionKey(Vec<OsString>);

impl CompositionKey {
    /// Build a key from names in bottom-to-top order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Names in bottom-to-top order.
    pub fn names(&self) -> &[OsString] {
        &self.0
    }
}

/// Derive the cache key of a composition.
pub fn key_of(composition: &Composition) -> CompositionKey {
    CompositionKey::from_names(composition.ids())
}

impl fmt::Display for CompositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            f.write_str(&name.to_string_lossy())?;
        }
        Ok(())
    }
}
