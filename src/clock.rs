//! External MIDI clock and transport tracking.
//!
//! The looper does not keep time itself. [`ClockState`] follows the incoming
//! real-time messages and tells the engine what changed, so the engine can
//! restart, stop or advance the looper track in step with the clock source.
//!
//! # Thread Safety
//! [`ClockState`] is cloned into the GUI for display while the engine thread
//! feeds it. Counters are atomics; the BPM window sits behind a mutex.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::midi::{InputEvent, BEATS_PER_BAR, CLOCKS_PER_BEAT};

/// Pulses in the rolling BPM window (1 bar at 24 ppqn in 4/4)
const BPM_WINDOW_CLOCKS: usize = (BEATS_PER_BAR * CLOCKS_PER_BEAT) as usize;

/// What a message did to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportChange {
    /// Playback restarted from the top.
    Started,
    Continued,
    Stopped,
    /// The running clock moved to this count.
    Advanced(u64),
    None,
}

/// Timestamps of the most recent clock pulses.
#[derive(Debug, Default)]
struct PulseWindow {
    times: VecDeque<Instant>,
}

impl PulseWindow {
    /// Record a pulse and return the tempo over the window, once there are
    /// at least two pulses to measure.
    fn push(&mut self, now: Instant) -> Option<f64> {
        if self.times.len() == BPM_WINDOW_CLOCKS {
            self.times.pop_front();
        }
        self.times.push_back(now);

        let oldest = *self.times.front()?;
        let intervals = self.times.len().checked_sub(1).filter(|n| *n > 0)?;
        let elapsed = now.duration_since(oldest).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let beats = intervals as f64 / CLOCKS_PER_BEAT as f64;
        Some(beats / (elapsed / 60.0))
    }

    fn clear(&mut self) {
        self.times.clear();
    }
}

/// Shared clock state between the engine thread and the GUI.
///
/// # Auto-start Behavior
/// Clock pulses from a source that is already running start playback on
/// their own, until the first explicit START/STOP/CONTINUE. From then on only
/// transport messages control playback.
#[derive(Clone)]
pub struct ClockState {
    running: Arc<AtomicBool>,
    seen_transport: Arc<AtomicBool>,
    clock_count: Arc<AtomicU64>,
    bpm_x100: Arc<AtomicU64>,
    pulses: Arc<Mutex<PulseWindow>>,
}

impl ClockState {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            seen_transport: Arc::new(AtomicBool::new(false)),
            clock_count: Arc::new(AtomicU64::new(0)),
            bpm_x100: Arc::new(AtomicU64::new(0)),
            pulses: Arc::new(Mutex::new(PulseWindow::default())),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn get_clock_count(&self) -> u64 {
        self.clock_count.load(Ordering::SeqCst)
    }

    /// Get current position as (bar, beat) tuple, both 1-indexed.
    pub fn get_position(&self) -> (u64, u64) {
        let beats = self.get_clock_count() / CLOCKS_PER_BEAT;
        (beats / BEATS_PER_BAR + 1, beats % BEATS_PER_BAR + 1)
    }

    pub fn get_bpm(&self) -> f64 {
        self.bpm_x100.load(Ordering::SeqCst) as f64 / 100.0
    }

    pub fn handle_midi_message(&self, message: &[u8]) -> TransportChange {
        self.handle_midi_message_at(message, Instant::now())
    }

    /// Handle a MIDI message with a specific timestamp (for testing).
    pub fn handle_midi_message_at(&self, message: &[u8], now: Instant) -> TransportChange {
        match InputEvent::parse(message) {
            InputEvent::Start => {
                self.seen_transport.store(true, Ordering::SeqCst);
                self.running.store(true, Ordering::SeqCst);
                self.clock_count.store(0, Ordering::SeqCst);
                self.bpm_x100.store(0, Ordering::SeqCst);
                if let Ok(mut pulses) = self.pulses.lock() {
                    pulses.clear();
                }
                TransportChange::Started
            }
            InputEvent::Continue => {
                self.seen_transport.store(true, Ordering::SeqCst);
                self.running.store(true, Ordering::SeqCst);
                TransportChange::Continued
            }
            InputEvent::Stop => {
                self.seen_transport.store(true, Ordering::SeqCst);
                self.running.store(false, Ordering::SeqCst);
                TransportChange::Stopped
            }
            InputEvent::Clock => self.pulse(now),
            _ => TransportChange::None,
        }
    }

    fn pulse(&self, now: Instant) -> TransportChange {
        let auto_started =
            !self.seen_transport.load(Ordering::SeqCst) && !self.running.swap(true, Ordering::SeqCst);

        // Tempo is tracked even while stopped
        if let Ok(mut pulses) = self.pulses.lock() {
            if let Some(bpm) = pulses.push(now) {
                self.bpm_x100.store((bpm * 100.0) as u64, Ordering::SeqCst);
            }
        }

        if auto_started {
            return TransportChange::Started;
        }
        if !self.is_running() {
            return TransportChange::None;
        }
        let count = self.clock_count.fetch_add(1, Ordering::SeqCst) + 1;
        TransportChange::Advanced(count)
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new()
    }
}
