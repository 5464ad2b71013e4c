//! Upload body source: the retained download or generated filler

use crate::types::PayloadSource;
use bytes::Bytes;

/// Byte source for an upload probe
#[derive(Debug, Clone)]
pub enum UploadPayload {
    /// Borrowed view of the bytes kept from the download phase
    Retained(Bytes),
    /// ASCII '0' filler
    Synthetic,
}

impl UploadPayload {
    /// Use the retained bytes when there are any, filler otherwise
    pub fn from_retained(retained: Option<Bytes>) -> Self {
        match retained {
            Some(bytes) if !bytes.is_empty() => Self::Retained(bytes),
            _ => Self::Synthetic,
        }
    }

    pub fn source(&self) -> PayloadSource {
        match self {
            Self::Retained(_) => PayloadSource::RetainedDownload,
            Self::Synthetic => PayloadSource::Synthetic,
        }
    }

    /// Endless sequence of body chunks of at most `chunk_size` bytes
    pub fn chunks(&self, chunk_size: usize) -> ChunkCycle {
        let chunk_size = chunk_size.max(1);
        let data = match self {
            Self::Retained(bytes) => bytes.clone(),
            Self::Synthetic => Bytes::from(vec![b'0'; chunk_size]),
        };
        ChunkCycle {
            data,
            chunk_size,
            offset: 0,
        }
    }
}

/// Cycles over a buffer in zero-copy slices
#[derive(Debug, Clone)]
pub struct ChunkCycle {
    data: Bytes,
    chunk_size: usize,
    offset: usize,
}

impl Iterator for ChunkCycle {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.data.is_empty() {
            return None;
        }
        if self.offset >= self.data.len() {
            self.offset = 0;
        }
        let end = (self.offset + self.chunk_size).min(self.data.len());
        let chunk = self.data.slice(self.offset..end);
        self.offset = end;
        Some(chunk)
    }
}
