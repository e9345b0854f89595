//! Auto-load decision logic for the card list.
//!
//! The UI reports how close the view is to the trailing edge after every
//! scroll or resize; this state machine decides whether that observation
//! should start a page load. It owns no timers and does no I/O, and the
//! clock is passed in, so every transition is unit-testable.
//!
//! Gating is re-evaluated on every observation. Nothing is latched from
//! earlier scroll positions: a fire requires the trigger to be armed and
//! enabled, the cursor idle and unexhausted, the gap within the threshold,
//! and the debounce window elapsed, all at the moment of the call.

use std::time::{Duration, Instant};

use crate::douban::cursor::FeedCursor;

/// Rows from the trailing edge at which loading starts.
pub const DEFAULT_THRESHOLD_ROWS: u16 = 4;

/// Minimum spacing between fires; terminal scroll events arrive in bursts.
const DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// Not watching (feed disabled or not yet attached).
    Idle,
    /// Watching for the trailing edge.
    Armed,
    /// A load this trigger started is in flight.
    Firing,
}

#[derive(Debug)]
pub struct ScrollTrigger {
    state: TriggerState,
    enabled: bool,
    threshold_rows: u16,
    last_fire: Option<Instant>,
}

impl ScrollTrigger {
    pub fn new(threshold_rows: u16) -> Self {
        ScrollTrigger {
            state: TriggerState::Idle,
            enabled: true,
            threshold_rows,
            last_fire: None,
        }
    }

    /// Start watching. No-op when already armed or firing.
    pub fn attach(&mut self) {
        if self.state == TriggerState::Idle {
            self.state = TriggerState::Armed;
        }
    }

    /// Stop watching entirely (the feature-gate off state).
    pub fn detach(&mut self) {
        self.state = TriggerState::Idle;
        self.last_fire = None;
    }

    /// Freeze or resume automatic loading. Detached state and cursor are
    /// untouched; a disabled trigger still tracks as armed and resumes
    /// exactly where it was.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Feed one observation of the trailing-edge gap. Returns true exactly
    /// when the caller should start a page load; the trigger then stays in
    /// [`TriggerState::Firing`] until [`settle`](Self::settle) is called.
    pub fn observe(&mut self, gap_rows: u16, cursor: &FeedCursor, now: Instant) -> bool {
        if self.state != TriggerState::Armed || !self.enabled {
            return false;
        }
        if cursor.loading || cursor.exhausted {
            return false;
        }
        if gap_rows > self.threshold_rows {
            return false;
        }
        if let Some(last) = self.last_fire {
            if now.duration_since(last) < DEBOUNCE {
                return false;
            }
        }

        self.state = TriggerState::Firing;
        self.last_fire = Some(now);
        true
    }

    /// The load started by the last fire has finished (either way); go back
    /// to watching. No-op unless currently firing.
    pub fn settle(&mut self) {
        if self.state == TriggerState::Firing {
            self.state = TriggerState::Armed;
        }
    }
}
