use crate::config::ConfigError;
use thiserror::Error;
use uuid::Uuid;

/// Session usage and setup errors.
///
/// Compilation and execution problems are never reported through this type;
/// they are data in `CompilationOutcome` and `ExecutionOutcome`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("An artifact is already staged; recycle the session before compiling again")]
    AlreadyCompiled,
    #[error("No artifact is staged; compile before executing")]
    NotCompiled,
    #[error("Isolation domain {0} was abandoned by a timed-out run; recycle the session")]
    DomainAbandoned(Uuid),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
