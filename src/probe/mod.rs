//! Download, upload and latency probes plus the rate sampler they share

pub mod download;
pub mod latency;
pub mod payload;
pub mod rate;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use download::{DownloadOutcome, DownloadProber};
pub use latency::LatencyProber;
pub use payload::UploadPayload;
pub use rate::{mbps, RateSampler};
pub use upload::{UploadOutcome, UploadProber};

use crate::error::{AppError, Result};
use futures::FutureExt;
use std::{any::Any, future::Future, panic::AssertUnwindSafe};

/// Run one probe, turning panics and unexpected errors into an
/// `EndpointUnreachable` for that endpoint alone.
pub async fn guarded<T, F>(label: &str, probe: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(probe).catch_unwind().await {
        Ok(result) => result.map_err(AppError::into_probe_failure),
        Err(panic) => Err(AppError::endpoint_unreachable(format!(
            "{}: probe aborted unexpectedly ({})",
            label,
            panic_detail(panic.as_ref())
        ))),
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_detail(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
