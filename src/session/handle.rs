//! Control handle for a spawned link session

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use super::machine::LinkSession;
use super::pipeline::FixPipeline;
use super::state::{LinkState, SessionTimings};
use crate::error::{GeoDetectorError, Result};
use crate::events::EventSink;
use crate::geo::SharedRegions;
use crate::serial::LinkOpener;

/// Commands accepted by the session worker
#[derive(Debug)]
pub(crate) enum Command {
    Open,
    Close(oneshot::Sender<()>),
    Stop,
}

/// Handle to a running link session
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<LinkState>,
    worker: JoinHandle<()>,
}

impl SessionHandle {
    /// Spawn the session worker; it starts Idle.
    ///
    /// # Arguments
    ///
    /// * `opener` - Opens the link on every (re)connect
    /// * `timings` - Watchdog and retry parameters
    /// * `regions` - Region set shared with region reloads
    /// * `events` - Where grid, region, time and status events go
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use geo_detector::events::EventSink;
    /// use geo_detector::geo::SharedRegions;
    /// use geo_detector::serial::SerialOpener;
    /// use geo_detector::session::{SessionHandle, SessionTimings};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let (events, _rx) = EventSink::channel();
    ///     let opener = SerialOpener::new("/dev/ttyUSB0", 4800);
    ///     let session = SessionHandle::spawn(opener, SessionTimings::default(), SharedRegions::default(), events);
    ///     session.open()?;
    ///     session.close().await?;
    ///     session.stop().await;
    ///     Ok(())
    /// }
    /// ```
    pub fn spawn<O>(
        opener: O,
        timings: SessionTimings,
        regions: SharedRegions,
        events: EventSink,
    ) -> Self
    where
        O: LinkOpener + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Idle);

        let pipeline = FixPipeline::new(regions, events.clone());
        let session = LinkSession::new(opener, timings, pipeline, events, command_rx, state_tx);
        let worker = tokio::spawn(session.run());

        Self {
            commands: command_tx,
            state: state_rx,
            worker,
        }
    }

    /// Current state
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Start opening the link; ignored unless Idle.
    ///
    /// # Errors
    ///
    /// Returns `SessionStopped` if the worker has exited
    pub fn open(&self) -> Result<()> {
        self.commands
            .send(Command::Open)
            .map_err(|_| GeoDetectorError::SessionStopped)
    }

    /// Close the link and wait until the worker is Idle.
    ///
    /// # Errors
    ///
    /// Returns `SessionStopped` if the worker has exited
    pub async fn close(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(Command::Close(ack_tx))
            .map_err(|_| GeoDetectorError::SessionStopped)?;
        ack_rx.await.map_err(|_| GeoDetectorError::SessionStopped)
    }

    /// Stop the worker and wait for it to close the link and exit
    pub async fn stop(self) {
        let _ = self.commands.send(Command::Stop);
        if let Err(e) = self.worker.await {
            warn!("Link session worker ended abnormally: {}", e);
        }
    }
}
