//! # Link Session
//!
//! Owns the GPS link and turns its sentence stream into detector events.
//!
//! This module handles:
//! - The Idle → Opening → AwaitingData → AwaitingTimeSync → Streaming lifecycle
//! - Open, close and stop commands from any task
//! - The decode → locate → resolve pipeline shared with replays

mod handle;
mod machine;
pub mod pipeline;
pub mod state;

pub use handle::SessionHandle;
pub use pipeline::{FixPipeline, LineOutcome, PositionUpdate};
pub use state::{LinkState, SessionTimings, Watchdog};
