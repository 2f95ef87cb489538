//! Error kinds shared by the decoder, type roots and the component locator.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;

pub type Result<T, E = ApiModelError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ApiModelError {
    #[error("malformed class file: {reason}")]
    MalformedBinaryUnit { reason: String },

    #[error("truncated class file: {section} needs {needed} bytes, {remaining} remaining")]
    TruncatedBinaryUnit {
        section: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("unsupported class file feature: {feature}")]
    UnsupportedFeature { feature: String },

    #[error("byte source unavailable for {unit}: {source}")]
    SourceUnavailable {
        unit: String,
        #[source]
        source: SourceError,
    },

    #[error("no content found for component {id}")]
    ComponentNotFound { id: String },

    #[error("invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Underlying cause of a [`ApiModelError::SourceUnavailable`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Zip(#[from] ZipError),
}

impl ApiModelError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedBinaryUnit {
            reason: reason.into(),
        }
    }

    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
        }
    }

    pub fn source_unavailable(unit: impl Into<String>, source: impl Into<SourceError>) -> Self {
        Self::SourceUnavailable {
            unit: unit.into(),
            source: source.into(),
        }
    }

    /// Only I/O failures are worth retrying; decode errors reproduce on identical bytes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Self::MalformedBinaryUnit { .. } => FaultKind::MalformedBinaryUnit,
            Self::TruncatedBinaryUnit { .. } => FaultKind::TruncatedBinaryUnit,
            Self::UnsupportedFeature { .. } => FaultKind::UnsupportedFeature,
            Self::SourceUnavailable { .. } => FaultKind::SourceUnavailable,
            Self::ComponentNotFound { .. } => FaultKind::ComponentNotFound,
            Self::Config { .. } => FaultKind::Config,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    MalformedBinaryUnit,
    TruncatedBinaryUnit,
    UnsupportedFeature,
    SourceUnavailable,
    ComponentNotFound,
    Config,
}

/// A unit that could not be read or decoded. Kept next to the successfully
/// decoded types so a missing unit is never mistaken for missing API.
#[derive(Debug, Clone, Serialize)]
pub struct UnitFault {
    pub qualified_name: String,
    pub location: String,
    pub kind: FaultKind,
    pub message: String,
}

impl UnitFault {
    pub fn new(
        qualified_name: impl Into<String>,
        location: impl Into<String>,
        error: &ApiModelError,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            location: location.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_source_errors_are_retryable() {
        let io = ApiModelError::source_unavailable(
            "a.A",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(io.is_retryable());
        assert!(!ApiModelError::malformed("bad magic").is_retryable());
        assert!(!ApiModelError::unsupported("Record").is_retryable());
    }

    #[test]
    fn unit_fault_keeps_kind_and_message() {
        let err = ApiModelError::TruncatedBinaryUnit {
            section: "constant pool",
            needed: 4,
            remaining: 1,
        };
        let fault = UnitFault::new("a.B", "demo.jar!/a/B.class", &err);
        assert_eq!(fault.kind, FaultKind::TruncatedBinaryUnit);
        assert!(fault.message.contains("constant pool"));
    }
}
