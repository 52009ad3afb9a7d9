use std::io;

/// Errors a sample source can signal from `read()`.
///
/// `Unavailable` is the uniform "cannot answer right now" signal. Callers
/// treat it identically whatever the cause — a missing driver, a revoked
/// permission, or a counter that has not accumulated yet. It is an expected
/// long-running state, not a fault, and is retried on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SourceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
