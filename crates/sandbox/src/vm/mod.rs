//! Interpreter for emitted artifacts
//!
//! Runs entirely on a domain's worker thread. Host members are looked up by
//! qualified name in a [`host::NativeTable`]; failures inside the program are
//! raised as [`Fault`]s and carried to the caller as plain data.

pub(crate) mod host;
pub(crate) mod interpreter;
pub(crate) mod value;

use crate::capture::CaptureError;
use crate::permissions::{PermissionDenied, SECURITY_EXCEPTION};

pub(crate) const NULL_REFERENCE: &str = "System.NullReferenceException";
pub(crate) const INVALID_CAST: &str = "System.InvalidCastException";
pub(crate) const INVALID_OPERATION: &str = "System.InvalidOperationException";
pub(crate) const MISSING_MEMBER: &str = "System.MissingMemberException";
pub(crate) const MISSING_METHOD: &str = "System.MissingMethodException";
pub(crate) const ARGUMENT_NULL: &str = "System.ArgumentNullException";
pub(crate) const ARGUMENT_OUT_OF_RANGE: &str = "System.ArgumentOutOfRangeException";
pub(crate) const FORMAT: &str = "System.FormatException";
pub(crate) const OVERFLOW: &str = "System.OverflowException";
pub(crate) const DIVIDE_BY_ZERO: &str = "System.DivideByZeroException";
pub(crate) const INDEX_OUT_OF_RANGE: &str = "System.IndexOutOfRangeException";

/// A failure raised by the interpreter or a host member.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fault {
    Raise { type_name: String, message: String },
    /// The domain was torn down; unwind without reporting anything.
    Abort,
}

impl Fault {
    pub(crate) fn new(type_name: &str, message: impl Into<String>) -> Self {
        Fault::Raise {
            type_name: type_name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn null_reference() -> Self {
        Fault::new(
            NULL_REFERENCE,
            "Object reference not set to an instance of an object.",
        )
    }
}

impl From<PermissionDenied> for Fault {
    fn from(denied: PermissionDenied) -> Self {
        Fault::new(SECURITY_EXCEPTION, denied.to_string())
    }
}

impl From<CaptureError> for Fault {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::PermissionDenied(denied) => denied.into(),
            CaptureError::Interrupted => Fault::Abort,
        }
    }
}
