//! Trait abstraction for link operations to enable testing

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::time::Duration;

use crate::error::Result;

/// Trait for an open, line-oriented link to the GPS receiver
#[async_trait]
pub trait LinkPort: Send {
    /// Wait up to `timeout` for inbound bytes.
    ///
    /// Returns `Ok(false)` if nothing arrived in time.
    async fn wait_for_data(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Read one line without its terminator.
    ///
    /// Returns `Ok(None)` if no complete line arrived within `timeout`.
    async fn read_line(&mut self, timeout: Duration) -> io::Result<Option<Bytes>>;

    /// Release the underlying device
    async fn close(&mut self);
}

/// Trait for opening links; each call yields a fresh link
#[cfg_attr(test, mockall::automock)]
pub trait LinkOpener: Send {
    /// Attempt to open the link once
    fn open(&mut self) -> Result<Box<dyn LinkPort>>;

    /// Human readable description of the link (e.g. `/dev/ttyUSB0 @ 4800`)
    fn describe(&self) -> String;
}
