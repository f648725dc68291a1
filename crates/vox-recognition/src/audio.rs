//! Push-style audio buffer and stream ingestion.

use std::io;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::types::RecognitionError;

/// Bytes requested from the source per read.
pub const CHUNK_SIZE: usize = 80_000;

/// Write-then-close byte sink handed to the engine.
///
/// Chunks keep the order they were pushed in. Once [`close`](Self::close) is
/// called the contents are fixed.
#[derive(Debug, Default)]
pub struct AudioBuffer {
    chunks: Vec<Bytes>,
    len: usize,
    closed: bool,
}

impl AudioBuffer {
    /// Create an empty, open buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty chunks are accepted and ignored.
    pub fn push(&mut self, chunk: Bytes) -> Result<(), RecognitionError> {
        if self.closed {
            return Err(RecognitionError::BufferClosed);
        }
        if !chunk.is_empty() {
            self.len += chunk.len();
            self.chunks.push(chunk);
        }
        Ok(())
    }

    /// Close the buffer for writing. Irreversible; repeated calls are no-ops.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether the buffer has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Total bytes appended.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes were appended.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunks in push order.
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Copy all chunks into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            many => {
                let mut out = BytesMut::with_capacity(self.len);
                for chunk in many {
                    out.extend_from_slice(chunk);
                }
                out.freeze()
            }
        }
    }

    /// Consume the buffer as a stream of chunks (for streaming request bodies).
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::iter(self.chunks.into_iter().map(Ok))
    }
}

/// Result of draining an audio source.
#[derive(Debug)]
pub enum Ingested {
    /// The source produced zero bytes.
    Empty,
    /// The source produced audio; the buffer is closed.
    Audio(AudioBuffer),
}

/// Drain `source` into a closed [`AudioBuffer`].
///
/// Reads up to [`CHUNK_SIZE`] bytes at a time through one scratch buffer.
/// Returns [`Ingested::Empty`] when the source yields nothing, and
/// [`RecognitionError::Ingestion`] on the first read error (the partial
/// buffer is dropped).
pub async fn ingest<R>(mut source: R) -> Result<Ingested, RecognitionError>
where
    R: AsyncRead + Unpin,
{
    let mut scratch = vec![0u8; CHUNK_SIZE];
    let mut buffer = AudioBuffer::new();
    let mut total = 0usize;

    loop {
        let read = source
            .read(&mut scratch)
            .await
            .map_err(RecognitionError::Ingestion)?;
        if read == 0 {
            break;
        }
        total += read;
        buffer.push(Bytes::copy_from_slice(&scratch[..read]))?;
    }
    buffer.close();

    debug!(bytes = total, chunks = buffer.chunks().len(), "audio ingested");
    if total == 0 {
        Ok(Ingested::Empty)
    } else {
        Ok(Ingested::Audio(buffer))
    }
}
