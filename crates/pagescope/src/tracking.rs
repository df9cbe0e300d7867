//! Tracking State Machine
//!
//! Decides whether pushed console/network events are kept, dropped, or have
//! nowhere to go, and owns the event buffers.
//!
//! ```text
//!            start               pause
//!   Idle ───────────► Recording ───────► Paused
//!                       ▲  │  ◄───────    │
//!                 start │  │    start     │
//!                       │  ▼ stop         │ stop
//!                     Stopped ◄───────────┘
//! ```
//!
//! Buffers exist only in `Recording` and `Paused`. Starting from `Idle` or
//! `Stopped` creates fresh buffers; starting from `Paused` keeps them.

use crate::bridge::BridgeMessage;
use crate::network::NetworkCallRecord;
use crate::scripts::{CONSOLE_CHANNEL, NETWORK_CHANNEL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Tracking phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingState {
    /// Never started
    #[default]
    Idle,
    /// Capturing events
    Recording,
    /// Events arrive but are discarded; buffers kept
    Paused,
    /// Buffers discarded, scripts removed
    Stopped,
}

impl TrackingState {
    /// Whether buffers exist in this state
    #[must_use]
    pub const fn has_buffers(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    /// Which controls a host toggle should offer
    #[must_use]
    pub const fn available_actions(&self) -> TrackingActions {
        match self {
            Self::Idle | Self::Stopped => TrackingActions {
                start: true,
                pause: false,
                stop: false,
            },
            Self::Recording => TrackingActions {
                start: false,
                pause: true,
                stop: true,
            },
            Self::Paused => TrackingActions {
                start: true,
                pause: false,
                stop: true,
            },
        }
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Enabled controls for a host affordance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct TrackingActions {
    /// Start (or resume)
    pub start: bool,
    /// Pause
    pub pause: bool,
    /// Stop
    pub stop: bool,
}

/// What a `start` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Entered Recording with new, empty buffers
    Fresh,
    /// Left Paused; buffers retained
    Resumed,
    /// Was already recording; nothing changed
    AlreadyRecording,
}

/// Why an event was not buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Tracking is paused
    Paused,
    /// No buffers (idle or stopped)
    NotTracking,
    /// Payload did not match the channel's contract
    Malformed,
    /// Channel is not one of ours
    UnknownChannel,
    /// Buffer cap reached
    BufferFull,
}

/// Copy of the buffers taken at a snapshot's join point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedEvents {
    /// Console lines in call order
    pub console: Vec<String>,
    /// Network records in completion order
    pub network: Vec<NetworkCallRecord>,
}

/// The tracking state machine and its buffers
#[derive(Debug, Default)]
pub struct Tracker {
    state: TrackingState,
    console: Option<Vec<String>>,
    network: Option<Vec<NetworkCallRecord>>,
    interceptors_installed: bool,
    max_events: Option<usize>,
    dropped: u64,
}

impl Tracker {
    /// Create an idle tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap each buffer at `max` events
    #[must_use]
    pub const fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = Some(max);
        self
    }

    /// Current phase
    #[must_use]
    pub const fn state(&self) -> TrackingState {
        self.state
    }

    /// Events discarded since creation, while paused or over the cap
    #[must_use]
    pub const fn dropped_events(&self) -> u64 {
        self.dropped
    }

    /// Enter Recording
    pub fn start(&mut self) -> StartOutcome {
        let outcome = match self.state {
            TrackingState::Recording => return StartOutcome::AlreadyRecording,
            TrackingState::Paused => StartOutcome::Resumed,
            TrackingState::Idle | TrackingState::Stopped => {
                self.console = Some(Vec::new());
                self.network = Some(Vec::new());
                StartOutcome::Fresh
            }
        };
        self.state = TrackingState::Recording;
        tracing::info!(?outcome, "tracking started");
        outcome
    }

    /// Enter Paused; returns whether anything changed
    pub fn pause(&mut self) -> bool {
        if self.state != TrackingState::Recording {
            return false;
        }
        self.state = TrackingState::Paused;
        tracing::info!("tracking paused");
        true
    }

    /// Enter Stopped and drop the buffers; returns whether anything changed
    pub fn stop(&mut self) -> bool {
        if !self.state.has_buffers() {
            return false;
        }
        self.console = None;
        self.network = None;
        self.state = TrackingState::Stopped;
        tracing::info!("tracking stopped");
        true
    }

    /// Whether the interceptors still need to be installed
    #[must_use]
    pub const fn needs_injection(&self) -> bool {
        !self.interceptors_installed
    }

    /// Claim the interceptor injection; true only for the first caller
    /// until [`Tracker::mark_removed`]
    pub fn claim_injection(&mut self) -> bool {
        if self.interceptors_installed {
            return false;
        }
        self.interceptors_installed = true;
        true
    }

    /// Record that the interceptors were removed
    pub fn mark_removed(&mut self) {
        self.interceptors_installed = false;
    }

    /// Buffer one console line
    pub fn record_console(&mut self, line: impl Into<String>) -> Result<(), DropReason> {
        self.admit()?;
        let max = self.max_events;
        let buffer = self.console.as_mut().ok_or(DropReason::NotTracking)?;
        if max.is_some_and(|max| buffer.len() >= max) {
            self.dropped += 1;
            return Err(DropReason::BufferFull);
        }
        buffer.push(line.into());
        Ok(())
    }

    /// Buffer one network record
    pub fn record_network(&mut self, record: NetworkCallRecord) -> Result<(), DropReason> {
        self.admit()?;
        let max = self.max_events;
        let buffer = self.network.as_mut().ok_or(DropReason::NotTracking)?;
        if max.is_some_and(|max| buffer.len() >= max) {
            self.dropped += 1;
            return Err(DropReason::BufferFull);
        }
        buffer.push(record);
        Ok(())
    }

    /// Route a bridge message to the matching buffer
    pub fn handle_message(&mut self, message: &BridgeMessage) -> Result<(), DropReason> {
        match message.channel.as_str() {
            CONSOLE_CHANNEL => {
                let line = message.payload.as_str().ok_or(DropReason::Malformed)?;
                self.record_console(line)
            }
            NETWORK_CHANNEL => {
                let record = NetworkCallRecord::from_payload(&message.payload)
                    .ok_or(DropReason::Malformed)?;
                self.record_network(record)
            }
            _ => Err(DropReason::UnknownChannel),
        }
    }

    /// Copy the buffers without draining them
    #[must_use]
    pub fn buffered(&self) -> BufferedEvents {
        BufferedEvents {
            console: self.console.clone().unwrap_or_default(),
            network: self.network.clone().unwrap_or_default(),
        }
    }

    fn admit(&mut self) -> Result<(), DropReason> {
        match self.state {
            TrackingState::Recording => Ok(()),
            TrackingState::Paused => {
                self.dropped += 1;
                Err(DropReason::Paused)
            }
            TrackingState::Idle | TrackingState::Stopped => Err(DropReason::NotTracking),
        }
    }
}

/// Tracker shared between the channel handlers and the collector
///
/// The lock is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedTracker(Arc<Mutex<Tracker>>);

impl SharedTracker {
    /// Share a tracker
    #[must_use]
    pub fn new(tracker: Tracker) -> Self {
        Self(Arc::new(Mutex::new(tracker)))
    }

    /// Run `f` with exclusive access
    pub fn with<R>(&self, f: impl FnOnce(&mut Tracker) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Current phase
    #[must_use]
    pub fn state(&self) -> TrackingState {
        self.with(|t| t.state())
    }

    /// Copy the buffers
    #[must_use]
    pub fn buffered(&self) -> BufferedEvents {
        self.with(|t| t.buffered())
    }
}
