//! MIDI protocol constants, input decoding and the hardware note sink.
//!
//! Real-time messages drive the transport; channel note messages are what the
//! looper records. Everything else passes through as [`InputEvent::Other`].

use midir::{MidiIO, MidiOutput, MidiOutputConnection};
use midly::live::{LiveEvent, SystemRealtime};
use midly::MidiMessage;
use thiserror::Error;
use tracing::{info, warn};

use crate::tape::NoteSink;

/// MIDI Clock tick - sent 24 times per quarter note (24 ppqn)
pub const MIDI_CLOCK: u8 = 0xF8;

/// MIDI Start - resets position to beginning and starts playback
pub const MIDI_START: u8 = 0xFA;

/// MIDI Continue - resumes playback from current position
pub const MIDI_CONTINUE: u8 = 0xFB;

/// MIDI Stop - stops playback, maintains current position
pub const MIDI_STOP: u8 = 0xFC;

/// Number of MIDI clock pulses per quarter note (beat)
pub const CLOCKS_PER_BEAT: u64 = 24;

/// Beats per bar (assuming 4/4 time signature)
pub const BEATS_PER_BAR: u64 = 4;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;

/// Errors from opening or writing MIDI ports.
#[derive(Debug, Error)]
pub enum MidiError {
    #[error("failed to create MIDI client: {0}")]
    Init(#[from] midir::InitError),
    #[error("no MIDI {0} ports found")]
    NoPorts(&'static str),
    #[error("failed to connect to {port}: {reason}")]
    Connect { port: String, reason: String },
    #[error("failed to send MIDI: {0}")]
    Send(#[from] midir::SendError),
}

/// A decoded incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    Clock,
    Start,
    Continue,
    Stop,
    Other,
}

impl InputEvent {
    /// Decode a raw message. Note-on with velocity 0 is a note-off.
    pub fn parse(message: &[u8]) -> Self {
        let Ok(event) = LiveEvent::parse(message) else {
            return Self::Other;
        };
        match event {
            LiveEvent::Midi { channel, message } => match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => Self::NoteOn {
                    channel: channel.as_int(),
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    Self::NoteOff {
                        channel: channel.as_int(),
                        pitch: key.as_int(),
                    }
                }
                _ => Self::Other,
            },
            LiveEvent::Realtime(SystemRealtime::TimingClock) => Self::Clock,
            LiveEvent::Realtime(SystemRealtime::Start) => Self::Start,
            LiveEvent::Realtime(SystemRealtime::Continue) => Self::Continue,
            LiveEvent::Realtime(SystemRealtime::Stop) => Self::Stop,
            _ => Self::Other,
        }
    }
}

/// Pick the first port whose name contains `preferred`, else the first port.
pub fn find_port<T: MidiIO>(io: &T, preferred: &str) -> Option<(T::Port, String)> {
    let ports = io.ports();
    let index = ports
        .iter()
        .position(|p| {
            io.port_name(p)
                .map(|n| n.contains(preferred))
                .unwrap_or(false)
        })
        .unwrap_or(0);

    let port = ports.get(index)?.clone();
    let name = io.port_name(&port).unwrap_or_else(|_| "Unknown".to_string());
    Some((port, name))
}

/// Display name for a MIDI note number, e.g. `60` -> `C4`.
pub fn note_name(note: u8) -> String {
    let names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i8 - 1;
    let name = names[(note % 12) as usize];
    format!("{}{}", name, octave)
}

/// Wrapper for MIDI output connection, playing notes on one channel.
pub struct MidiOut {
    connection: MidiOutputConnection,
    channel: u8,
    pub port_name: String,
}

impl MidiOut {
    /// Connect to the port matching `preferred`, sending on `channel` (0-15).
    pub fn connect(preferred: &str, channel: u8) -> Result<Self, MidiError> {
        let midi_out = MidiOutput::new("looper-out")?;
        let (port, port_name) = find_port(&midi_out, preferred).ok_or(MidiError::NoPorts("output"))?;

        let connection = midi_out
            .connect(&port, "looper-out")
            .map_err(|e| MidiError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        info!("MIDI output connected to: {}", port_name);
        Ok(Self {
            connection,
            channel: channel & 0x0F,
            port_name,
        })
    }

    /// Send a MIDI message.
    pub fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        Ok(self.connection.send(message)?)
    }

    fn send_or_warn(&mut self, message: &[u8]) {
        if let Err(e) = self.send(message) {
            warn!("dropping note message {:02X?}: {}", message, e);
        }
    }
}

impl NoteSink for MidiOut {
    fn note_on(&mut self, pitch: u8, velocity: u8) {
        let message = [NOTE_ON | self.channel, pitch & 0x7F, velocity & 0x7F];
        self.send_or_warn(&message);
    }

    fn note_off(&mut self, pitch: u8) {
        let message = [NOTE_OFF | self.channel, pitch & 0x7F, 0];
        self.send_or_warn(&message);
    }
}
