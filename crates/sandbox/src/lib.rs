//! ConsoleBox sandbox
//!
//! Runs compiled ConsoleBox artifacts inside isolation domains: private
//! output capture, a restricted permission set, a wall-clock time budget and
//! recycling of domains that had to be abandoned.

pub mod capture;
pub mod config;
pub mod domain;
pub mod error;
pub mod outcome;
pub mod permissions;
pub mod session;
pub mod stats;
pub mod supervisor;
pub mod workspace;

mod vm;

// Re-export commonly used types
pub use capture::{CaptureError, OutputCapture};
pub use config::{ConfigError, LogFormat, LoggingConfig, SandboxConfig};
pub use domain::IsolationDomain;
pub use error::{Result, SessionError};
pub use outcome::{ExecutionOutcome, FailureInfo};
pub use permissions::{Permission, PermissionDenied, PermissionSet, SECURITY_EXCEPTION};
pub use session::{Session, SessionState};
pub use stats::ExecutionStats;
pub use supervisor::Supervisor;
pub use workspace::ArtifactStore;
