//! HTTP round-trip latency probe

use crate::{
    catalog::Endpoint,
    client::HttpClient,
    error::{AppError, Result},
    executor::cancel::CancelFlag,
    models::metrics::{LatencyAggregate, LatencyResult},
    probe::guarded,
};
use std::{sync::Arc, time::Duration};
use tokio::time::{timeout, Instant};

/// Issues one HEAD per host and times the answer
#[derive(Clone)]
pub struct LatencyProber {
    client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl LatencyProber {
    pub fn new(client: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Probe one host. Failures become a "no response" entry, never an error.
    pub async fn probe_host(&self, host: &Endpoint) -> LatencyResult {
        let start = Instant::now();
        let attempt = async {
            match timeout(self.timeout, self.client.head(&host.url, self.timeout)).await {
                Ok(answered) => answered,
                Err(_) => Err(AppError::timeout(format!(
                    "no answer within {}s",
                    self.timeout.as_secs()
                ))),
            }
        };

        match guarded(&host.label, attempt).await {
            Ok(status) if status < 500 => {
                let round_trip_ms = start.elapsed().as_secs_f64() * 1000.0;
                LatencyResult::success(&host.label, &host.url, round_trip_ms, status)
            }
            Ok(status) => LatencyResult::no_response(&host.label, &host.url, format!("HTTP {}", status)),
            Err(e) => LatencyResult::no_response(&host.label, &host.url, e.to_string()),
        }
    }

    /// Probe every host in order and aggregate the results.
    ///
    /// `on_result` sees each entry as soon as it is known. Only cancellation
    /// is reported as an error.
    pub async fn probe_all<F>(&self, hosts: &[Endpoint], cancel: &CancelFlag, mut on_result: F) -> Result<LatencyAggregate>
    where
        F: FnMut(&LatencyResult) + Send,
    {
        let mut results = Vec::with_capacity(hosts.len());

        for host in hosts {
            cancel.check()?;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                result = self.probe_host(host) => result,
            };
            on_result(&result);
            results.push(result);
        }

        Ok(LatencyAggregate::from_results(results))
    }
}
