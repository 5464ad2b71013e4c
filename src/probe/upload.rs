//! Time-boxed streaming upload probe

use crate::{
    catalog::Endpoint,
    client::{ByteStream, HttpClient},
    defaults::{UPLOAD_CHUNK_SIZE, UPLOAD_RESPONSE_GRACE},
    error::{AppError, Result},
    executor::cancel::CancelFlag,
    models::metrics::{ProbeResult, ProbeSample, RateObservation},
    probe::{payload::UploadPayload, rate::RateSampler},
    types::PayloadSource,
};
use bytes::Bytes;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};

/// Chunks queued ahead of the transport
const UPLOAD_QUEUE_DEPTH: usize = 2;

/// A successful upload attempt
#[derive(Debug)]
pub struct UploadOutcome {
    pub result: ProbeResult,
    pub payload_source: PayloadSource,
}

/// Streams a repeating payload to one sink for at most `budget`
#[derive(Clone)]
pub struct UploadProber {
    client: Arc<dyn HttpClient>,
    budget: Duration,
    grace: Duration,
}

/// Request body fed from a channel; counts bytes as the transport pulls them
fn counting_body(mut rx: mpsc::Receiver<Bytes>, sent: Arc<AtomicU64>) -> ByteStream {
    Box::pin(futures::stream::poll_fn(move |cx| {
        rx.poll_recv(cx).map(|chunk| {
            chunk.map(|bytes| {
                sent.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                Ok(bytes)
            })
        })
    }))
}

impl UploadProber {
    pub fn new(client: Arc<dyn HttpClient>, budget: Duration) -> Self {
        Self {
            client,
            budget,
            grace: UPLOAD_RESPONSE_GRACE,
        }
    }

    /// Override how long to wait for the sink's answer once the body is closed
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Upload to `endpoint` until the budget runs out.
    ///
    /// Hitting the budget mid-transfer is a successful measurement. Errors
    /// are `EndpointUnreachable`, `EndpointRejected` or `Cancelled`.
    pub async fn probe<F>(
        &self,
        endpoint: &Endpoint,
        payload: &UploadPayload,
        cancel: &CancelFlag,
        mut on_rate: F,
    ) -> Result<UploadOutcome>
    where
        F: FnMut(RateObservation) + Send,
    {
        cancel.check()?;
        let start = Instant::now();
        let deadline = start + self.budget;

        let (tx, rx) = mpsc::channel::<Bytes>(UPLOAD_QUEUE_DEPTH);
        let sent = Arc::new(AtomicU64::new(0));
        let mut upload = self.client.upload(&endpoint.url, counting_body(rx, sent.clone()));

        let mut sampler = RateSampler::new();
        let mut response: Option<Result<u16>> = None;

        for chunk in payload.chunks(UPLOAD_CHUNK_SIZE) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = sleep_until(deadline) => break,
                answered = &mut upload => {
                    response = Some(answered);
                    break;
                }
                queued = tx.send(chunk) => {
                    // The transport dropped the body
                    if queued.is_err() {
                        break;
                    }
                }
            }

            let sample = ProbeSample::new(sent.load(Ordering::Relaxed), start.elapsed());
            if let Some(observation) = sampler.record(sample) {
                on_rate(observation);
            }
        }

        // Chunks the transport pulls after this point fall outside the budget
        let elapsed = start.elapsed();
        let bytes = sent.load(Ordering::Relaxed);
        if let Some(observation) = sampler.record(ProbeSample::new(bytes, elapsed)) {
            on_rate(observation);
        }
        drop(tx);

        let response = match response {
            Some(answered) => Some(answered),
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                answered = timeout(self.grace, &mut upload) => answered.ok(),
            },
        };

        match response {
            Some(Ok(status)) if !(200..300).contains(&status) => {
                return Err(AppError::endpoint_rejected(format!(
                    "{} answered HTTP {}",
                    endpoint.url, status
                )));
            }
            Some(Err(e)) if bytes == 0 => return Err(e.into_probe_failure()),
            _ => {}
        }

        if bytes == 0 {
            return Err(AppError::endpoint_unreachable(format!(
                "{}: no data accepted",
                endpoint.url
            )));
        }

        let mut result = ProbeResult::measured(&endpoint.label, &endpoint.url, bytes, elapsed);
        result.rate_mbps = result.rate_mbps.map(|_| sampler.finalize(elapsed));

        Ok(UploadOutcome {
            result,
            payload_source: payload.source(),
        })
    }
}
