//! Time-boxed streaming download probe

use crate::{
    catalog::Endpoint,
    client::HttpClient,
    defaults::DOWNLOAD_CHUNK_SIZE,
    error::{AppError, Result},
    executor::cancel::CancelFlag,
    models::metrics::{ProbeResult, RateObservation},
    probe::rate::RateSampler,
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep_until, timeout, Instant};

/// A successful download attempt
#[derive(Debug)]
pub struct DownloadOutcome {
    pub result: ProbeResult,
    /// Bytes kept for the upload phase, when retention was requested
    pub payload: Option<Bytes>,
}

/// Streams one endpoint for at most `budget`
#[derive(Clone)]
pub struct DownloadProber {
    client: Arc<dyn HttpClient>,
    budget: Duration,
    io_timeout: Duration,
}

impl DownloadProber {
    pub fn new(client: Arc<dyn HttpClient>, budget: Duration, io_timeout: Duration) -> Self {
        Self {
            client,
            budget,
            io_timeout,
        }
    }

    /// Download from `endpoint` until the body ends or the budget runs out.
    ///
    /// `retain_limit` caps how many received bytes are kept for reuse.
    /// Errors are `EndpointUnreachable`, `EndpointRejected` or `Cancelled`.
    pub async fn probe<F>(
        &self,
        endpoint: &Endpoint,
        retain_limit: Option<usize>,
        cancel: &CancelFlag,
        mut on_rate: F,
    ) -> Result<DownloadOutcome>
    where
        F: FnMut(RateObservation) + Send,
    {
        cancel.check()?;
        let start = Instant::now();
        let deadline = start + self.budget;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            opened = timeout(self.io_timeout, self.client.open_download(&endpoint.url)) => opened,
        };
        let mut body = match opened {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(e.into_probe_failure()),
            Err(_) => {
                return Err(AppError::endpoint_unreachable(format!(
                    "{}: no response within {}s",
                    endpoint.url,
                    self.io_timeout.as_secs()
                )))
            }
        };

        let mut sampler = RateSampler::new();
        let mut received: u64 = 0;
        let mut retained = retain_limit.map(|_| BytesMut::new());
        let limit = retain_limit.unwrap_or(0);
        let mut stream_error: Option<AppError> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = sleep_until(deadline) => break,
                next = timeout(self.io_timeout, body.next()) => next,
            };

            let mut chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    stream_error = Some(e);
                    break;
                }
                Err(_) => {
                    stream_error = Some(AppError::timeout(format!(
                        "read stalled for {}s",
                        self.io_timeout.as_secs()
                    )));
                    break;
                }
            };

            while !chunk.is_empty() {
                cancel.check()?;
                let piece = chunk.split_to(chunk.len().min(DOWNLOAD_CHUNK_SIZE));
                received += piece.len() as u64;

                if let Some(buffer) = retained.as_mut() {
                    let room = limit.saturating_sub(buffer.len());
                    if room > 0 {
                        buffer.extend_from_slice(&piece[..piece.len().min(room)]);
                    }
                }

                if let Some(observation) = sampler.add_bytes(piece.len() as u64, start.elapsed()) {
                    on_rate(observation);
                }
            }

            if start.elapsed() >= self.budget {
                break;
            }
        }

        let elapsed = start.elapsed();
        if received == 0 {
            let reason = stream_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no data received".to_string());
            return Err(AppError::endpoint_unreachable(format!("{}: {}", endpoint.url, reason)));
        }

        // A stream that broke after data arrived still measured something
        let mut result = ProbeResult::measured(&endpoint.label, &endpoint.url, received, elapsed);
        result.rate_mbps = result.rate_mbps.map(|_| sampler.finalize(elapsed));

        Ok(DownloadOutcome {
            result,
            payload: retained.map(BytesMut::freeze).filter(|b| !b.is_empty()),
        })
    }
}
