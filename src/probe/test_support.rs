//! Scripted `HttpClient` used by the probe and executor unit tests

use crate::client::{ByteStream, HttpClient};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// How a scripted download endpoint behaves
#[derive(Debug, Clone)]
pub(crate) enum DownloadScript {
    /// Fail before any byte is sent
    Fail(AppError),
    /// Send `count` chunks of `size` bytes, waiting `delay` before each
    Chunks { count: usize, size: usize, delay: Duration, fill: u8 },
    /// Send `count` chunks then fail the stream
    ChunksThenError { count: usize, size: usize, delay: Duration },
}

/// How a scripted upload sink behaves
#[derive(Debug, Clone)]
pub(crate) enum UploadScript {
    Fail(AppError),
    /// Consume the body at `delay` per chunk, then answer `status`
    Accept { status: u16, delay: Duration },
}

/// How a scripted latency host behaves
#[derive(Debug, Clone)]
pub(crate) enum HeadScript {
    Answer { status: u16, after: Duration },
    Hang,
}

/// Record of what an upload sink received
#[derive(Debug, Clone, Default)]
pub(crate) struct UploadRecord {
    pub url: String,
    pub bytes: u64,
    pub first_chunk: Option<Bytes>,
}

#[derive(Default)]
pub(crate) struct ScriptedClient {
    downloads: HashMap<String, DownloadScript>,
    uploads: HashMap<String, UploadScript>,
    heads: HashMap<String, HeadScript>,
    pub upload_log: Mutex<Vec<UploadRecord>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn download(mut self, url: &str, script: DownloadScript) -> Self {
        self.downloads.insert(url.to_string(), script);
        self
    }

    pub fn upload(mut self, url: &str, script: UploadScript) -> Self {
        self.uploads.insert(url.to_string(), script);
        self
    }

    pub fn head(mut self, url: &str, script: HeadScript) -> Self {
        self.heads.insert(url.to_string(), script);
        self
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.upload_log.lock().unwrap().clone()
    }
}

fn chunk_stream(count: usize, size: usize, delay: Duration, fill: u8) -> impl futures::Stream<Item = Result<Bytes>> {
    stream::iter(0..count).then(move |_| async move {
        tokio::time::sleep(delay).await;
        Ok(Bytes::from(vec![fill; size]))
    })
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn open_download(&self, url: &str) -> Result<ByteStream> {
        match self.downloads.get(url).cloned() {
            None => Err(AppError::endpoint_unreachable(format!("{}: no route", url))),
            Some(DownloadScript::Fail(err)) => Err(err),
            Some(DownloadScript::Chunks { count, size, delay, fill }) => {
                Ok(Box::pin(chunk_stream(count, size, delay, fill)))
            }
            Some(DownloadScript::ChunksThenError { count, size, delay }) => {
                let tail = stream::once(async { Err(AppError::network("connection reset")) });
                Ok(Box::pin(chunk_stream(count, size, delay, 1).chain(tail)))
            }
        }
    }

    async fn upload(&self, url: &str, mut body: ByteStream) -> Result<u16> {
        let (status, delay) = match self.uploads.get(url).cloned() {
            None => return Err(AppError::endpoint_unreachable(format!("{}: no route", url))),
            Some(UploadScript::Fail(err)) => return Err(err),
            Some(UploadScript::Accept { status, delay }) => (status, delay),
        };

        let mut record = UploadRecord {
            url: url.to_string(),
            ..UploadRecord::default()
        };
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            tokio::time::sleep(delay).await;
            record.bytes += chunk.len() as u64;
            if record.first_chunk.is_none() {
                record.first_chunk = Some(chunk);
            }
        }
        self.upload_log.lock().unwrap().push(record);
        Ok(status)
    }

    async fn head(&self, url: &str, _timeout: Duration) -> Result<u16> {
        match self.heads.get(url).cloned() {
            None => Err(AppError::endpoint_unreachable(format!("{}: no route", url))),
            Some(HeadScript::Answer { status, after }) => {
                tokio::time::sleep(after).await;
                Ok(status)
            }
            Some(HeadScript::Hang) => {
                std::future::pending::<()>().await;
                Ok(200)
            }
        }
    }
}
