use std::any::Any;
use std::path::{Path, PathBuf};

/// Result alias used across the crate.
pub type LayerstackResult<T> = Result<T, LayerstackError>;

/// Every failure a generation run can hit.
#[derive(thiserror::Error, Debug)]
pub enum LayerstackError {
    /// A layer directory holds no eligible (non-directory) entries.
    #[error("empty layer source: '{}' has no layer files", .0.display())]
    EmptySource(PathBuf),

    /// A layer directory or one of its files could not be read.
    #[error("cannot read layer source '{}': {source}", .path.display())]
    SourceAccess {
        /// Directory or file that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A layer file is not a decodable raster image.
    #[error("cannot decode layer '{}': {source}", .path.display())]
    Decode {
        /// File that failed to decode.
        path: PathBuf,
        /// Underlying codec failure.
        #[source]
        source: image::ImageError,
    },

    /// Encoding or writing an output image failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Invalid run configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Broken internal invariant (cache overwrite, dead worker channel, ...).
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LayerstackError {
    pub fn source_access(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::SourceAccess {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn decode(path: impl AsRef<Path>, source: image::ImageError) -> Self {
        Self::Decode {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// `true` for errors that no failure policy may absorb.
    ///
    /// Per-unit failures (reading, decoding or persisting one unit) return `false`.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(
            self,
            Self::EmptySource(_) | Self::Validation(_) | Self::Internal(_) | Self::Other(_)
        )
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
