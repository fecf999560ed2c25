use crate::value::ValueError;
use thiserror::Error;

/// How the orchestrating caller must react to an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    /// A bug or missing protocol implementation: abort the process,
    /// never retry, never skip.
    Fatal,
    /// A rejected block. `certain` rejections halt indexing of the
    /// branch; uncertain ones may be retried after a re-fetch.
    Rejected { certain: bool },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation of block {level} failed: {message}")]
    Validation {
        level: i32,
        message: String,
        certain: bool,
    },

    #[error("unsupported operation kind `{kind}` at level {level}: protocol implementation incomplete")]
    UnsupportedKind { level: i32, kind: String },

    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    #[error("cannot parse block: {0}")]
    Parse(String),

    #[error("missing required field `{0}` in node response")]
    MissingField(&'static str),

    #[error("protocol downgrade from {from} to {to} is not supported outside of a revert")]
    ProtocolDowngrade { from: u32, to: u32 },

    #[error("balance arithmetic failed: {0}")]
    Value(#[from] ValueError),

    #[error("could not deserialize node response")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::Validation { certain, .. } => Severity::Rejected { certain: *certain },
            Error::Parse(_) | Error::MissingField(_) | Error::Json(_) => {
                // a malformed response may be a transient transport problem
                Severity::Rejected { certain: false }
            }
            Error::UnsupportedKind { .. }
            | Error::InconsistentState(_)
            | Error::ProtocolDowngrade { .. }
            | Error::Value(_) => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn validation(level: i32, message: impl Into<String>) -> Self {
        Error::Validation {
            level,
            message: message.into(),
            certain: true,
        }
    }

    pub fn maybe_stale(level: i32, message: impl Into<String>) -> Self {
        Error::Validation {
            level,
            message: message.into(),
            certain: false,
        }
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        Error::InconsistentState(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_kind_is_fatal() {
        let err = Error::UnsupportedKind {
            level: 42,
            kind: "brand_new_thing".into(),
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn uncertain_validation_is_retryable() {
        let err = Error::maybe_stale(7, "head moved");
        assert_eq!(err.severity(), Severity::Rejected { certain: false });
    }
}
