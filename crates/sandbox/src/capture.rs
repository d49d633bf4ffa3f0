//! In-memory stand-in for the console streams
//!
//! One [`OutputCapture`] belongs to exactly one isolation domain. Input is
//! never available: requesting it fails with a permission denial, and the
//! blocking reads park until the owning domain is torn down.

use crate::permissions::{Permission, PermissionDenied};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Granularity at which parked operations notice cancellation.
pub(crate) const PARK_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CaptureError {
    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),
    #[error("Blocking read interrupted by domain teardown")]
    Interrupted,
}

#[derive(Debug)]
pub struct OutputCapture {
    buffer: Mutex<Option<Vec<u8>>>,
    cancel: Arc<AtomicBool>,
}

impl OutputCapture {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            buffer: Mutex::new(None),
            cancel,
        }
    }

    pub fn write(&self, text: &str) {
        self.buffer
            .lock()
            .get_or_insert_with(Vec::new)
            .extend_from_slice(text.as_bytes());
    }

    /// Everything written since the last clear.
    pub fn read_to_end(&self) -> String {
        match self.buffer.lock().as_deref() {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => String::new(),
        }
    }

    /// Drop the backing storage; the next write allocates afresh.
    pub fn clear(&self) {
        self.buffer.lock().take();
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn request_input(&self) -> Result<(), CaptureError> {
        Err(PermissionDenied::from(Permission::Console).into())
    }

    pub fn request_key(&self, intercept: bool) -> Result<(), CaptureError> {
        tracing::debug!(intercept, "key request refused");
        Err(PermissionDenied::from(Permission::Console).into())
    }

    /// Never yields a character; returns only once the domain is cancelled.
    pub fn block_read(&self) -> Result<i64, CaptureError> {
        self.park()?;
        Ok(-1)
    }

    pub fn block_read_line(&self) -> Result<String, CaptureError> {
        self.park()?;
        Ok(String::new())
    }

    fn park(&self) -> Result<(), CaptureError> {
        while !self.cancel.load(Ordering::SeqCst) {
            std::thread::sleep(PARK_SLICE);
        }
        Err(CaptureError::Interrupted)
    }
}
