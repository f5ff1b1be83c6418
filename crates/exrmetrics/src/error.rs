//! Error types for the exrmetrics copy engine.
//!
//! Every fallible operation in this crate returns [`Result`]. Failures fall
//! into a small number of categories:
//!
//! - **Argument errors**: [`InvalidArgument`](Error::InvalidArgument), e.g. a
//!   negative level index or a part index past the end of the file
//! - **Capability errors**: [`UnsupportedMode`](Error::UnsupportedMode) and
//!   [`IncompatibleOption`](Error::IncompatibleOption), raised before any
//!   pixel data is touched
//! - **Layout errors**: [`OutOfBounds`](Error::OutOfBounds) and
//!   [`LayoutMismatch`](Error::LayoutMismatch)
//! - **Codec errors**: [`Codec`](Error::Codec) and [`Io`](Error::Io), passed
//!   through unchanged from the OpenEXR codec and the file system
//!
//! # Usage
//!
//! ```rust
//! use exrmetrics::{Error, Result};
//!
//! fn check_level(level: i32) -> Result<()> {
//!     if level < 0 {
//!         return Err(Error::invalid_argument(format!("level index {level} is negative")));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_level(-1).unwrap_err().is_argument_error());
//! ```

use thiserror::Error;

use crate::geometry::Bounds;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while measuring a part copy.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value is outside its valid domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The part kind, level mode or rounding mode cannot be handled.
    ///
    /// Deep tiled parts with mipmap or ripmap levels end up here.
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// A requested option does not apply to the chosen compression.
    #[error("incompatible option: {0}")]
    IncompatibleOption(String),

    /// Pixel coordinates fall outside the data window a buffer was built for.
    #[error("pixel ({x}, {y}) is outside of data window {window}")]
    OutOfBounds {
        /// Requested x coordinate.
        x: i32,
        /// Requested y coordinate.
        y: i32,
        /// Window covered by the buffer.
        window: Bounds,
    },

    /// Buffer shapes or sample counts disagree between reader and writer.
    #[error("layout mismatch: {0}")]
    LayoutMismatch(String),

    /// Error reported by the OpenEXR codec.
    #[error("codec error: {0}")]
    Codec(#[from] exr::error::Error),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an [`InvalidArgument`](Error::InvalidArgument) error.
    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an [`UnsupportedMode`](Error::UnsupportedMode) error.
    #[inline]
    pub fn unsupported_mode(msg: impl Into<String>) -> Self {
        Self::UnsupportedMode(msg.into())
    }

    /// Creates an [`IncompatibleOption`](Error::IncompatibleOption) error.
    #[inline]
    pub fn incompatible_option(msg: impl Into<String>) -> Self {
        Self::IncompatibleOption(msg.into())
    }

    /// Creates an [`OutOfBounds`](Error::OutOfBounds) error.
    #[inline]
    pub fn out_of_bounds(x: i32, y: i32, window: Bounds) -> Self {
        Self::OutOfBounds { x, y, window }
    }

    /// Creates a [`LayoutMismatch`](Error::LayoutMismatch) error.
    #[inline]
    pub fn layout_mismatch(msg: impl Into<String>) -> Self {
        Self::LayoutMismatch(msg.into())
    }

    /// Returns `true` for caller mistakes that no retry can fix.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::IncompatibleOption(_))
    }

    /// Returns `true` when the input itself cannot be processed.
    pub fn is_capability_error(&self) -> bool {
        matches!(self, Self::UnsupportedMode(_))
    }

    /// Returns `true` for failures raised by the codec or the file system.
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Self::Codec(_) | Self::Io(_))
    }
}
