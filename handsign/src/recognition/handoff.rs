//! Cross-thread handoff between a landmark producer and the session.
//!
//! `FrameSlot` holds at most one pending frame; publishing overwrites an
//! unconsumed frame, so a slow consumer always sees the newest data and
//! nothing queues up. `CooldownMonitor` lets another thread (a UI, say)
//! read the cooldown without touching the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use super::hand_tracking::HandObservation;

/// Hands seen in one frame, with its session timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp_s: f64,
    pub hands: Vec<HandObservation>,
}

// ── Frame slot ─────────────────────────────────────────────

/// Depth-1, latest-wins mailbox.
#[derive(Debug, Default)]
pub struct FrameSlot {
    pending: Mutex<Option<Frame>>,
    dropped: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame. Returns true if an unconsumed frame was replaced.
    pub fn publish(&self, frame: Frame) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let replaced = pending.replace(frame).is_some();
        if replaced {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Frame slot: stale frame dropped");
        }
        replaced
    }

    /// Remove and return the pending frame, if any.
    pub fn take(&self) -> Option<Frame> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Frames overwritten before they were consumed.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ── Cooldown monitor ───────────────────────────────────────

/// Bit pattern marking "no accepted word yet".
const UNSET: u64 = u64::MAX;

/// Lock-free snapshot of the session's cooldown clock.
///
/// Each value is a single `f64` stored as bits in an `AtomicU64`, so
/// reads are never torn. Only the owning session writes.
#[derive(Debug, Clone)]
pub struct CooldownMonitor {
    last_accepted: Arc<AtomicU64>,
    duration: Arc<AtomicU64>,
}

impl CooldownMonitor {
    pub fn new(duration_s: f64) -> Self {
        Self {
            last_accepted: Arc::new(AtomicU64::new(UNSET)),
            duration: Arc::new(AtomicU64::new(duration_s.to_bits())),
        }
    }

    pub fn last_accepted(&self) -> Option<f64> {
        match self.last_accepted.load(Ordering::Acquire) {
            UNSET => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    pub fn duration(&self) -> f64 {
        f64::from_bits(self.duration.load(Ordering::Acquire))
    }

    /// Seconds of cooldown left at `now_s`; 0 when ready.
    pub fn remaining(&self, now_s: f64) -> f64 {
        match self.last_accepted() {
            Some(last) => (self.duration() - (now_s - last)).max(0.0),
            None => 0.0,
        }
    }

    pub fn is_ready(&self, now_s: f64) -> bool {
        self.remaining(now_s) <= 0.0
    }

    pub(crate) fn store_last(&self, last: Option<f64>) {
        let bits = last.map_or(UNSET, f64::to_bits);
        self.last_accepted.store(bits, Ordering::Release);
    }

    pub(crate) fn store_duration(&self, duration_s: f64) {
        self.duration.store(duration_s.to_bits(), Ordering::Release);
    }
}

// ── Tests ──────────────────────────────────────────────────
