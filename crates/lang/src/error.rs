use crate::ast::Span;
use thiserror::Error;

/// Front-end failures that are turned into diagnostics before leaving the crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LangError {
    #[error("Lexing failed: {message}")]
    Lexing { message: String, span: Span },
    #[error("Parsing failed: {message}")]
    Parsing { message: String, span: Span },
}

impl LangError {
    pub fn lexing(message: impl Into<String>, span: Span) -> Self {
        LangError::Lexing {
            message: message.into(),
            span,
        }
    }

    pub fn parsing(message: impl Into<String>, span: Span) -> Self {
        LangError::Parsing {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            LangError::Lexing { span, .. } | LangError::Parsing { span, .. } => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LangError::Lexing { message, .. } | LangError::Parsing { message, .. } => message,
        }
    }
}

/// Failures while producing or reading an executable artifact.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Artifact integrity check failed: expected digest {expected}, found {actual}")]
    Integrity { expected: String, actual: String },
    #[error("Unsupported artifact format version {0}")]
    UnsupportedVersion(u32),
    #[error("Node at line {line} has no binding information")]
    Unbound { line: usize },
    #[error("Program has no entry point")]
    MissingEntryPoint,
}

pub type Result<T> = std::result::Result<T, LangError>;
