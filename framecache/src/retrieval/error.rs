//! Retrieval error types.

use super::TransportError;
use std::fmt;
use thiserror::Error;

/// What a retrieval was fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrievalTarget {
    Header,
    Frame(u32),
}

impl fmt::Display for RetrievalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::Frame(n) => write!(f, "frame {}", n),
        }
    }
}

/// Errors returned by the retrieval client.
///
/// Cloneable so a memoized failure can be returned again to later callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// Every attempt failed; carries the last transport error.
    #[error("retrieval of {target} for '{instance_key}' failed after {attempts} attempts: {source}")]
    Transport {
        instance_key: String,
        target: RetrievalTarget,
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

impl RetrievalError {
    pub fn target(&self) -> RetrievalTarget {
        match self {
            Self::Transport { target, .. } => *target,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Transport { attempts, .. } => *attempts,
        }
    }
}
