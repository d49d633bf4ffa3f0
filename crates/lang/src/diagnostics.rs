//! Structured compiler diagnostics
//!
//! Diagnostics are plain data: once produced they are never mutated, only
//! replaced (see [`Diagnostic::escalate`]).

use crate::ast::Span;
use crate::error::LangError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// 1-based source range; the end column is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl From<Span> for LineSpan {
    fn from(span: Span) -> Self {
        Self {
            start_line: span.start.line.max(1),
            start_column: span.start.column.max(1),
            end_line: span.end.line.max(1),
            end_column: span.end.column.max(1),
        }
    }
}

/// Range in the shape editors expect for markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorRange {
    pub start_line_number: usize,
    pub start_column: usize,
    pub end_line_number: usize,
    pub end_column: usize,
}

/// A single compiler message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    id: String,
    severity: Severity,
    default_severity: Severity,
    message: String,
    span: LineSpan,
    escalated: bool,
}

impl Diagnostic {
    pub fn new(id: &str, severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            id: id.to_string(),
            severity,
            default_severity: severity,
            message: message.into(),
            span: span.into(),
            escalated: false,
        }
    }

    pub fn error(id: &str, message: impl Into<String>, span: Span) -> Self {
        Self::new(id, Severity::Error, message, span)
    }

    pub fn warning(id: &str, message: impl Into<String>, span: Span) -> Self {
        Self::new(id, Severity::Warning, message, span)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn default_severity(&self) -> Severity {
        self.default_severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> LineSpan {
        self.span
    }

    /// True when a warning was reported as an error.
    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    /// Only genuine errors block the artifact; escalated warnings do not.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error && !self.escalated
    }

    /// Warning reported with error severity under warnings-as-errors.
    pub fn escalate(self) -> Self {
        if self.severity != Severity::Warning {
            return self;
        }
        Self {
            severity: Severity::Error,
            escalated: true,
            ..self
        }
    }

    /// `ID | message | Line: n` for fatal diagnostics, empty otherwise.
    ///
    /// The line is zero-based, matching what the transport layer has always shown.
    pub fn readable_error_text(&self) -> String {
        if self.default_severity != Severity::Error || self.escalated {
            return String::new();
        }
        format!(
            "{} | {} | Line: {}",
            self.id,
            self.message,
            self.span.start_line.saturating_sub(1)
        )
    }

    /// Editor marker range; zero-width spans are widened one column to the left.
    pub fn editor_range(&self) -> EditorRange {
        let mut start_column = self.span.start_column;
        if self.span.start_line == self.span.end_line && start_column == self.span.end_column {
            start_column = start_column.saturating_sub(1).max(1);
        }
        EditorRange {
            start_line_number: self.span.start_line,
            start_column,
            end_line_number: self.span.end_line,
            end_column: self.span.end_column,
        }
    }
}

impl From<&LangError> for Diagnostic {
    fn from(error: &LangError) -> Self {
        let id = match error {
            LangError::Lexing { .. } => "CB1010",
            LangError::Parsing { .. } => "CB1002",
        };
        Diagnostic::error(id, error.message(), error.span())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{}): {} {}: {}",
            self.span.start_line,
            self.span.start_column,
            self.severity.to_string().to_lowercase(),
            self.id,
            self.message
        )
    }
}

/// Orders diagnostics by source position, keeping emission order for ties.
pub fn sort_by_position(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| (d.span.start_line, d.span.start_column));
}
