//! Error types for the seamless-tiles crate.

/// Errors that can occur while splitting, merging, or processing images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A split or engine parameter is out of range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The base image handed to a feathered merge does not match the grid.
    #[error(
        "image is {actual_width}x{actual_height} but the grid covers {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        /// Source width recorded by the grid.
        expected_width: u32,
        /// Source height recorded by the grid.
        expected_height: u32,
        /// Width of the supplied image.
        actual_width: u32,
        /// Height of the supplied image.
        actual_height: u32,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
