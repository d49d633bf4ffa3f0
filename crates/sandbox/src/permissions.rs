//! Permission descriptor for isolation domains
//!
//! A [`PermissionSet`] is fixed at construction. Domains only ever receive
//! execution plus read access to an allow list of paths; network, environment
//! and real console access are never grantable.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Failure type raised inside programs when a demand fails.
pub const SECURITY_EXCEPTION: &str = "System.Security.SecurityException";

/// A capability a host member needs before it acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission<'a> {
    FileRead(&'a Path),
    FileWrite(&'a Path),
    Network(&'a str),
    Environment(&'a str),
    Console,
    Execution,
}

impl Permission<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Permission::FileRead(_) | Permission::FileWrite(_) => {
                "System.Security.Permissions.FileIOPermission"
            }
            Permission::Network(_) => "System.Net.DnsPermission",
            Permission::Environment(_) => "System.Security.Permissions.EnvironmentPermission",
            Permission::Console => "System.Security.Permissions.UIPermission",
            Permission::Execution => "System.Security.Permissions.SecurityPermission",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Request for the permission of type '{permission_type}' failed.")]
pub struct PermissionDenied {
    pub permission_type: &'static str,
}

impl From<Permission<'_>> for PermissionDenied {
    fn from(permission: Permission<'_>) -> Self {
        Self {
            permission_type: permission.type_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    read_paths: Vec<PathBuf>,
    execution: bool,
}

impl PermissionSet {
    /// Execution plus read-only access beneath `read_paths`.
    pub fn sandbox<I, P>(read_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            read_paths: read_paths
                .into_iter()
                .map(Into::into)
                .filter_map(|path| normalize(&path))
                .collect(),
            execution: true,
        }
    }

    /// No access at all, not even execution.
    pub fn none() -> Self {
        Self {
            read_paths: Vec::new(),
            execution: false,
        }
    }

    /// The same read access with execution withdrawn.
    pub fn without_execution(mut self) -> Self {
        self.execution = false;
        self
    }

    pub fn read_paths(&self) -> &[PathBuf] {
        &self.read_paths
    }

    pub fn allows_execution(&self) -> bool {
        self.execution
    }

    pub fn allows_network(&self) -> bool {
        false
    }

    pub fn allows(&self, permission: Permission<'_>) -> bool {
        match permission {
            Permission::FileRead(path) => normalize(path)
                .map(|path| self.read_paths.iter().any(|root| path.starts_with(root)))
                .unwrap_or(false),
            Permission::Execution => self.execution,
            Permission::FileWrite(_)
            | Permission::Network(_)
            | Permission::Environment(_)
            | Permission::Console => false,
        }
    }

    pub fn demand(&self, permission: Permission<'_>) -> Result<(), PermissionDenied> {
        if self.allows(permission) {
            Ok(())
        } else {
            tracing::debug!(permission = permission.type_name(), "permission demand failed");
            Err(permission.into())
        }
    }
}

/// Lexically normalised absolute path; `None` for relative paths or paths
/// that climb with `..`.
fn normalize(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => return None,
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        std::env::temp_dir().join("consolebox-permissions")
    }

    #[test]
    fn test_read_limited_to_allow_list() {
        let set = PermissionSet::sandbox([root()]);
        assert!(set.allows(Permission::FileRead(&root().join("ConsoleApp_1.cbx"))));
        assert!(set.allows(Permission::FileRead(&root().join("./nested/file.txt"))));
        assert!(!set.allows(Permission::FileRead(Path::new("/etc/passwd"))));
        assert!(!set.allows(Permission::FileRead(&root().join("../escape.txt"))));
        assert!(!set.allows(Permission::FileRead(Path::new("relative.txt"))));
    }

    #[test]
    fn test_write_network_console_always_denied() {
        let set = PermissionSet::sandbox([root()]);
        assert!(!set.allows(Permission::FileWrite(&root().join("out.txt"))));
        assert!(!set.allows(Permission::Network("example.com")));
        assert!(!set.allows(Permission::Environment("PATH")));
        assert!(!set.allows(Permission::Console));
        assert!(set.allows_execution());
        assert!(!set.allows_network());
    }

    #[test]
    fn test_denial_message() {
        let denied = PermissionSet::none().demand(Permission::Console).unwrap_err();
        assert_eq!(
            denied.to_string(),
            "Request for the permission of type 'System.Security.Permissions.UIPermission' failed."
        );
    }

    #[test]
    fn test_execution_can_be_withdrawn() {
        let set = PermissionSet::sandbox([root()]).without_execution();
        assert!(!set.allows_execution());
        assert!(set.demand(Permission::Execution).is_err());
        assert!(set.allows(Permission::FileRead(&root().join("ConsoleApp_1.cbx"))));
        assert!(PermissionSet::sandbox([root()]).demand(Permission::Execution).is_ok());
    }

    #[test]
    fn test_relative_allow_entries_are_dropped() {
        let set = PermissionSet::sandbox(["relative/dir"]);
        assert!(set.read_paths().is_empty());
    }
}
