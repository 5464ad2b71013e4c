//! Ownership of the downloaded bytes reused as upload payload

use crate::probe::UploadPayload;
use bytes::Bytes;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Retained download bytes, owned by one run.
///
/// The size is mirrored into a gauge the run handle can read. Dropping the
/// buffer releases it, so an abandoned run never leaves bytes behind.
#[derive(Debug)]
pub struct RetainedPayload {
    bytes: Option<Bytes>,
    gauge: Arc<AtomicUsize>,
}

impl RetainedPayload {
    pub fn new(gauge: Arc<AtomicUsize>) -> Self {
        gauge.store(0, Ordering::SeqCst);
        Self { bytes: None, gauge }
    }

    /// Keep `bytes`, replacing anything held before
    pub fn store(&mut self, bytes: Bytes) {
        self.gauge.store(bytes.len(), Ordering::SeqCst);
        self.bytes = Some(bytes);
    }

    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, Bytes::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload for the upload prober; synthetic filler when nothing is held
    pub fn view(&self) -> UploadPayload {
        UploadPayload::from_retained(self.bytes.clone())
    }

    pub fn release(&mut self) {
        self.bytes = None;
        self.gauge.store(0, Ordering::SeqCst);
    }
}

impl Drop for RetainedPayload {
    fn drop(&mut self) {
        self.release();
    }
}
