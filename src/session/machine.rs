//! # Link Session Worker
//!
//! The state machine that owns the link.
//!
//! This module handles:
//! - Opening the link with a retry budget
//! - Watchdogs for initial data, time sync and the position stream
//! - Escalating text-decoding and link errors
//! - Commands from [`SessionHandle`](super::SessionHandle), checked between reads
//!
//! Every received sentence is logged under the `nmea` target so captures
//! can be replayed later.

use std::io;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::handle::Command;
use super::pipeline::{FixPipeline, LineOutcome};
use super::state::{LinkState, SessionTimings, Watchdog};
use crate::error::GeoDetectorError;
use crate::events::EventSink;
use crate::nmea::decoder::classify;
use crate::nmea::protocol::SentenceKind;
use crate::serial::{LinkOpener, LinkPort};

pub(crate) struct LinkSession<O> {
    opener: O,
    timings: SessionTimings,
    pipeline: FixPipeline,
    events: EventSink,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<LinkState>,
    state: LinkState,
    link: Option<Box<dyn LinkPort>>,
    watchdog: Watchdog,
    decode_errors: u32,
    exit_requested: bool,
}

impl<O: LinkOpener> LinkSession<O> {
    pub(crate) fn new(
        opener: O,
        timings: SessionTimings,
        pipeline: FixPipeline,
        events: EventSink,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<LinkState>,
    ) -> Self {
        Self {
            opener,
            timings,
            pipeline,
            events,
            commands,
            state_tx,
            state: LinkState::Idle,
            link: None,
            watchdog: Watchdog::new(),
            decode_errors: 0,
            exit_requested: false,
        }
    }

    /// Run until stopped, then close the link
    pub(crate) async fn run(mut self) {
        info!("Link session worker started");

        while !self.exit_requested {
            match self.state {
                LinkState::Idle => self.run_idle().await,
                LinkState::Opening => self.run_opening().await,
                LinkState::AwaitingData => self.run_awaiting_data().await,
                LinkState::AwaitingTimeSync => self.run_awaiting_time_sync().await,
                LinkState::Streaming => self.run_streaming().await,
            }
        }

        self.close_link().await;
        self.events.status("Link session stopped");
    }

    fn transition(&mut self, next: LinkState) {
        if self.state != next {
            debug!("Link session {} -> {}", self.state, next);
        }
        self.state = next;
        self.state_tx.send_replace(next);
    }

    fn in_state(&self, state: LinkState) -> bool {
        self.state == state && !self.exit_requested
    }

    async fn handle_command(&mut self, command: Option<Command>) {
        match command {
            Some(Command::Open) => {
                if self.state == LinkState::Idle {
                    self.transition(LinkState::Opening);
                } else {
                    debug!("Open ignored while {}", self.state);
                }
            }
            Some(Command::Close(ack)) => {
                self.close_link().await;
                self.transition(LinkState::Idle);
                let _ = ack.send(());
            }
            Some(Command::Stop) => self.exit_requested = true,
            None => {
                debug!("All session handles dropped");
                self.exit_requested = true;
            }
        }
    }

    /// Handle every queued command without waiting
    async fn poll_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.handle_command(Some(command)).await,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.handle_command(None).await;
                    break;
                }
            }
        }
    }

    /// Sleep, waking early for a command
    async fn pause(&mut self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            command = self.commands.recv() => self.handle_command(command).await,
        }
    }

    async fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close().await;
            info!("Serial port closed");
        }
    }

    async fn run_idle(&mut self) {
        self.decode_errors = 0;
        self.events.status("Idle, waiting for configuration");

        while self.in_state(LinkState::Idle) {
            let command = self.commands.recv().await;
            self.handle_command(command).await;
        }
    }

    async fn run_opening(&mut self) {
        self.events
            .status(format!("Opening serial port [{}]", self.opener.describe()));
        self.watchdog.tick();
        let mut fails_left = self.timings.open_fail_budget;

        while self.in_state(LinkState::Opening) {
            self.poll_commands().await;
            if !self.in_state(LinkState::Opening) {
                break;
            }

            match self.opener.open() {
                Ok(link) => {
                    self.link = Some(link);
                    self.transition(LinkState::AwaitingData);
                }
                Err(e) => {
                    warn!("Failed to open link: {}", e);
                    self.events.status(format!(
                        "Error opening serial port [{}]",
                        self.opener.describe()
                    ));
                    fails_left = fails_left.saturating_sub(1);
                    if fails_left == 0 || self.watchdog.expired(self.timings.open_timeout) {
                        self.events.status("Giving up on serial port");
                        self.transition(LinkState::Idle);
                    } else {
                        self.pause(self.timings.open_retry_interval).await;
                    }
                }
            }
        }
    }

    async fn run_awaiting_data(&mut self) {
        self.events.status("Waiting for initial GPS data");
        self.watchdog.tick();
        let poll_interval = self.timings.poll_interval;

        while self.in_state(LinkState::AwaitingData) {
            self.poll_commands().await;
            if !self.in_state(LinkState::AwaitingData) {
                break;
            }

            let result = match self.link.as_mut() {
                Some(link) => link.wait_for_data(poll_interval).await,
                None => {
                    warn!("No open link while awaiting data");
                    self.transition(LinkState::Opening);
                    break;
                }
            };

            match result {
                Ok(true) => {
                    self.watchdog.tick();
                    self.transition(LinkState::AwaitingTimeSync);
                }
                Ok(false) => {
                    if self.watchdog.expired(self.timings.data_timeout) {
                        self.events
                            .status("Timeout waiting for initial GPS data, closing port");
                        self.close_link().await;
                        self.transition(LinkState::Idle);
                    }
                }
                Err(e) => self.link_failed(e, LinkState::Idle).await,
            }
        }
    }

    async fn run_awaiting_time_sync(&mut self) {
        self.events.status("Waiting for GPS date/time sync");

        while self.in_state(LinkState::AwaitingTimeSync) {
            self.poll_commands().await;
            if !self.in_state(LinkState::AwaitingTimeSync) {
                break;
            }

            if let Some(line) = self.next_line(LinkState::Idle).await {
                if classify(&line) == Some(SentenceKind::Rmc) {
                    match self.pipeline.process_line(&line) {
                        Ok(LineOutcome::TimeSynced) => {
                            self.events.status("Date/time synced");
                            self.watchdog.tick();
                            self.transition(LinkState::Streaming);
                        }
                        Ok(_) => {}
                        Err(e) => debug!("Dropping sentence: {}", e),
                    }
                }
            }

            if self.in_state(LinkState::AwaitingTimeSync)
                && self.watchdog.expired(self.timings.sync_timeout)
            {
                self.events
                    .status("Timeout waiting for GPS date/time sync, closing port");
                self.close_link().await;
                self.transition(LinkState::Idle);
            }
        }
    }

    async fn run_streaming(&mut self) {
        self.events.status("Processing GPS data");

        while self.in_state(LinkState::Streaming) {
            self.poll_commands().await;
            if !self.in_state(LinkState::Streaming) {
                break;
            }

            if let Some(line) = self.next_line(LinkState::Opening).await {
                match self.pipeline.process_line(&line) {
                    Ok(outcome) if outcome.is_fix() => self.watchdog.tick(),
                    Ok(_) => {}
                    Err(e) => debug!("Dropping sentence: {}", e),
                }
            }

            if self.in_state(LinkState::Streaming)
                && self.watchdog.expired(self.timings.stream_timeout)
            {
                self.events
                    .status("Timeout waiting for GPS location data, restarting lock sequence");
                self.restart_link().await;
            }
        }
    }

    /// Close and immediately reopen after the stream went quiet
    async fn restart_link(&mut self) {
        self.close_link().await;
        match self.opener.open() {
            Ok(link) => {
                self.link = Some(link);
                self.transition(LinkState::AwaitingData);
            }
            Err(e) => {
                warn!("Failed to reopen link: {}", e);
                self.transition(LinkState::Opening);
            }
        }
    }

    /// Read one text line from the link.
    ///
    /// Link and text errors are handled here; `on_link_error` is the state
    /// entered after a link failure.
    async fn next_line(&mut self, on_link_error: LinkState) -> Option<String> {
        let read_timeout = self.timings.read_timeout;
        let result = match self.link.as_mut() {
            Some(link) => link.read_line(read_timeout).await,
            None => {
                warn!("No open link while {}", self.state);
                self.transition(LinkState::Opening);
                return None;
            }
        };

        match result {
            Ok(Some(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    self.decode_errors = 0;
                    let line = text.trim();
                    if line.is_empty() {
                        return None;
                    }
                    info!(target: "nmea", "{}", line);
                    Some(line.to_string())
                }
                Err(e) => {
                    self.text_decoding_failed(e.into()).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.link_failed(e, on_link_error).await;
                None
            }
        }
    }

    async fn text_decoding_failed(&mut self, error: GeoDetectorError) {
        self.decode_errors += 1;
        warn!("{} ({} consecutive)", error, self.decode_errors);
        self.events.status("Serial data error! Check baud rate");
        self.events.placeholders();

        if self.decode_errors >= self.timings.decode_error_limit {
            self.events.status("Too many serial data errors, closing port");
            self.close_link().await;
            self.transition(LinkState::Idle);
        }
    }

    async fn link_failed(&mut self, error: io::Error, next: LinkState) {
        let error = GeoDetectorError::LinkIo(error);
        warn!("{}", error);
        self.events.status(format!("Serial port error [{}]", error));
        self.events.placeholders();
        self.close_link().await;
        self.transition(next);
    }
}
