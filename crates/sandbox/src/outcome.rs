//! Execution outcome model
//!
//! The only thing that crosses back out of an isolation domain: plain data
//! describing how a run ended.

use crate::permissions::SECURITY_EXCEPTION;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Full type name of the failure that escaped the entry point
    pub type_name: String,
    pub message: String,
    pub stack_trace: String,
}

impl FailureInfo {
    pub fn new(
        type_name: impl Into<String>,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.type_name == SECURITY_EXCEPTION
    }
}

/// Result of one execute call; exactly one variant per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success { output: String, elapsed_ms: u64 },
    Timeout,
    Failure(FailureInfo),
}

impl ExecutionOutcome {
    pub fn success(output: String, elapsed_ms: u64) -> Self {
        ExecutionOutcome::Success { output, elapsed_ms }
    }

    pub fn failure(
        type_name: impl Into<String>,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        ExecutionOutcome::Failure(FailureInfo::new(type_name, message, stack_trace))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success { .. } => "success",
            ExecutionOutcome::Timeout => "timeout",
            ExecutionOutcome::Failure(_) => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionOutcome::Timeout)
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Success { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn failure_info(&self) -> Option<&FailureInfo> {
        match self {
            ExecutionOutcome::Failure(info) => Some(info),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_follow_variant() {
        let success = ExecutionOutcome::success("Hi".to_string(), 3);
        assert_eq!(success.output(), Some("Hi"));
        assert!(success.failure_info().is_none());

        let failure = ExecutionOutcome::failure(SECURITY_EXCEPTION, "denied", "");
        assert!(failure.output().is_none());
        assert!(failure.failure_info().unwrap().is_permission_denied());

        assert!(ExecutionOutcome::Timeout.is_timeout());
        assert_eq!(ExecutionOutcome::Timeout.kind(), "timeout");
    }

    #[test]
    fn test_serialized_shape() {
        let failure = ExecutionOutcome::failure("System.Exception", "boom", "   at main() in line 1");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "failure");
        assert_eq!(json["type_name"], "System.Exception");

        let json = serde_json::to_value(ExecutionOutcome::Timeout).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "timeout" }));
    }
}
