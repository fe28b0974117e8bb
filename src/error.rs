//! Error types for `simspace`.
//!
//! Four kinds, matching the taxonomy in the design spec: malformed input
//! (`FormatError`), bad configuration (`ConfigError`), allocation/IO failure
//! (`ResourceError`), and internal consistency violations
//! (`InvariantViolation`). Distance kernels never error; degenerate results
//! surface as `f32::NAN`, which callers order as `+inf`.

use thiserror::Error;

/// Result type alias for `simspace` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `simspace` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed record, dimensionality mismatch, out-of-order id, or bad
    /// header, with line/context for the caller (SIM-001).
    #[error("[SIM-001] format error at line {line}: {message}")]
    Format {
        /// 1-based line number in the source stream, 0 if not applicable.
        line: usize,
        /// Description of the malformed input.
        message: String,
    },

    /// Unknown parameter key, out-of-range value, or an incompatible
    /// space/index pairing (SIM-002).
    #[error("[SIM-002] config error for key '{key}': {message}")]
    Config {
        /// The rejected parameter key.
        key: String,
        /// Why the value or key was rejected.
        message: String,
    },

    /// Allocation failure or file I/O, surfaced with the path when known
    /// (SIM-003).
    #[error("[SIM-003] resource error: {message}")]
    Resource {
        /// Description of the failure.
        message: String,
    },

    /// Internal consistency check failed; indicates a bug, not a bad input
    /// (SIM-004).
    #[error("[SIM-004] invariant violated: {0}")]
    InvariantViolation(String),

    /// A divergence kernel's domain requirement was not met (e.g. a
    /// non-positive input to a divergence that requires positive support).
    #[error("[SIM-005] divergence domain error: {0}")]
    DivergenceDomain(String),

    /// IO error (SIM-006).
    #[error("[SIM-006] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (SIM-007).
    #[error("[SIM-007] serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns the stable error code (e.g. "SIM-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Format { .. } => "SIM-001",
            Self::Config { .. } => "SIM-002",
            Self::Resource { .. } => "SIM-003",
            Self::InvariantViolation(_) => "SIM-004",
            Self::DivergenceDomain(_) => "SIM-005",
            Self::Io(_) => "SIM-006",
            Self::Serialization(_) => "SIM-007",
        }
    }

    /// Constructs a `Format` error at a given line.
    #[must_use]
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }

    /// Constructs a `Config` error for a rejected key.
    #[must_use]
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Constructs a `Resource` error.
    #[must_use]
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }
}
