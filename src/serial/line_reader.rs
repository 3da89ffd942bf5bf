//! # Line Reader
//!
//! Splits a byte stream into lines with bounded waits.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{self, Instant};

use super::port_trait::LinkPort;

/// Longest line kept before the buffer is flushed as one (garbage) line.
pub const MAX_LINE_LEN: usize = 1024;

/// Buffered, timeout-aware line reader over any async byte source.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Split the next complete line off the buffer, dropping `\r\n`.
    fn take_line(&mut self) -> Option<Bytes> {
        if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }
            return Some(line.freeze());
        }

        if self.buffer.len() >= MAX_LINE_LEN {
            return Some(self.buffer.split().freeze());
        }

        None
    }

    async fn fill(&mut self) -> io::Result<usize> {
        self.buffer.reserve(MAX_LINE_LEN);
        let read = self.inner.read_buf(&mut self.buffer).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "link closed by device",
            ));
        }
        Ok(read)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LinkPort for LineReader<R> {
    async fn wait_for_data(&mut self, timeout: Duration) -> io::Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        match time::timeout(timeout, self.fill()).await {
            Ok(result) => result.map(|_| true),
            Err(_) => Ok(false),
        }
    }

    async fn read_line(&mut self, timeout: Duration) -> io::Result<Option<Bytes>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            match time::timeout_at(deadline, self.fill()).await {
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        self.buffer.clear();
    }
}
