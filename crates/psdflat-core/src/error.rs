// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for psdflat.

use thiserror::Error;

/// Top-level error type for all psdflat operations.
#[derive(Debug, Error)]
pub enum PsdflatError {
    // -- Job-level errors --
    #[error("input discovery failed: {0}")]
    Discovery(String),

    // -- Per-document errors --
    #[error("cannot decode document: {0}")]
    Decode(String),

    #[error("operation invoked out of order: {0}")]
    State(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PsdflatError {
    /// Whether this error aborts a whole batch run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Discovery(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PsdflatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_discovery_is_fatal() {
        assert!(PsdflatError::Discovery("gone".into()).is_fatal());
        assert!(!PsdflatError::Decode("bad".into()).is_fatal());
        assert!(!PsdflatError::State("early".into()).is_fatal());
        assert!(!PsdflatError::Encode("png".into()).is_fatal());
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!PsdflatError::from(io).is_fatal());
    }

    #[test]
    fn messages_carry_detail() {
        let err = PsdflatError::Decode("bad signature".into());
        assert_eq!(err.to_string(), "cannot decode document: bad signature");
    }
}
