//! The engine thread that owns the looper track.
//!
//! MIDI input arrives on the MIDI driver's thread and button presses on the
//! GUI thread. Neither touches the track: both send a [`Command`] down one
//! channel, and the engine applies them in order. That keeps every tape
//! operation, including playback advances, strictly sequential.

use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;
use tracing::{debug, info};

use crate::clock::{ClockState, TransportChange};
use crate::looper::{LooperTrack, TrackStatus};
use crate::midi::InputEvent;
use crate::tape::NoteSink;

pub enum Command {
    /// Raw bytes from the MIDI input.
    Midi(Vec<u8>),
    StartRecording,
    StopRecording,
    RemoveOldest,
    RemoveNewest,
    Clear,
    Shutdown,
}

/// Latest track status, shared with the GUI.
pub type SharedStatus = Arc<Mutex<TrackStatus>>;

pub struct Engine<S: NoteSink> {
    track: LooperTrack<S>,
    clock: ClockState,
    commands: Receiver<Command>,
    status: SharedStatus,
}

impl<S: NoteSink> Engine<S> {
    pub fn new(track: LooperTrack<S>, clock: ClockState, commands: Receiver<Command>) -> Self {
        let status = Arc::new(Mutex::new(track.status()));
        Self {
            track,
            clock,
            commands,
            status,
        }
    }

    pub fn status(&self) -> SharedStatus {
        Arc::clone(&self.status)
    }

    /// Apply commands until shutdown or until every sender is gone.
    ///
    /// Hands the track back for inspection.
    pub fn run(mut self) -> LooperTrack<S> {
        info!("looper engine running");
        while let Ok(command) = self.commands.recv() {
            if matches!(command, Command::Shutdown) {
                break;
            }
            self.apply(command);
            if let Ok(mut status) = self.status.lock() {
                *status = self.track.status();
            }
        }
        info!("looper engine stopped");
        self.track
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Midi(message) => self.handle_midi(&message),
            Command::StartRecording => self.track.start_recording(),
            Command::StopRecording => self.track.stop_recording(),
            Command::RemoveOldest => self.track.remove_oldest_note(),
            Command::RemoveNewest => self.track.remove_newest_note(),
            Command::Clear => self.track.clear(),
            Command::Shutdown => {}
        }
    }

    fn handle_midi(&mut self, message: &[u8]) {
        match self.clock.handle_midi_message(message) {
            TransportChange::Started => {
                debug!("transport started");
                self.track.start();
                self.track.tick(0);
            }
            TransportChange::Continued => self.track.resume(),
            TransportChange::Stopped => self.track.stop(),
            TransportChange::Advanced(clock_count) => self.track.tick(clock_count),
            TransportChange::None => match InputEvent::parse(message) {
                InputEvent::NoteOn {
                    pitch, velocity, ..
                } => self.track.note_on(pitch, velocity),
                InputEvent::NoteOff { pitch, .. } => self.track.note_off(pitch),
                _ => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{MIDI_CLOCK, MIDI_START, MIDI_STOP};
    use crate::tape::NoteEvent;
    use crossbeam_channel::unbounded;

    const BAR: u64 = 96;

    fn midi(bytes: &[u8]) -> Command {
        Command::Midi(bytes.to_vec())
    }

    fn clocks(count: u64) -> impl Iterator<Item = Command> {
        (0..count).map(|_| midi(&[MIDI_CLOCK]))
    }

    #[test]
    fn test_records_and_replays_through_queue() {
        let (tx, rx) = unbounded();
        let engine = Engine::new(LooperTrack::new(Vec::new(), BAR), ClockState::new(), rx);
        let status = engine.status();

        tx.send(midi(&[MIDI_START])).unwrap();
        tx.send(Command::StartRecording).unwrap();
        for command in clocks(10) {
            tx.send(command).unwrap();
        }
        tx.send(midi(&[0x90, 60, 100])).unwrap();
        for command in clocks(20) {
            tx.send(command).unwrap();
        }
        tx.send(midi(&[0x80, 60, 0])).unwrap();
        tx.send(Command::StopRecording).unwrap();
        for command in clocks(BAR) {
            tx.send(command).unwrap();
        }
        tx.send(Command::Shutdown).unwrap();

        let track = engine.run();
        let expected_pair = [
            NoteEvent::On {
                pitch: 60,
                velocity: 100,
            },
            NoteEvent::Off { pitch: 60 },
        ];
        assert_eq!(track.sink()[..], [expected_pair, expected_pair].concat()[..]);

        let status = status.lock().unwrap().clone();
        assert!(status.playing);
        assert!(!status.recording);
        assert_eq!(status.note_count, 1);
    }

    #[test]
    fn test_user_commands_reach_track() {
        let (tx, rx) = unbounded();
        let engine = Engine::new(LooperTrack::new(Vec::new(), BAR), ClockState::new(), rx);

        tx.send(midi(&[MIDI_START])).unwrap();
        tx.send(Command::StartRecording).unwrap();
        for pitch in [60u8, 62, 64] {
            tx.send(midi(&[0x90, pitch, 100])).unwrap();
            for command in clocks(4) {
                tx.send(command).unwrap();
            }
            tx.send(midi(&[0x80, pitch, 0])).unwrap();
        }
        tx.send(Command::RemoveNewest).unwrap();
        tx.send(Command::RemoveOldest).unwrap();
        drop(tx);

        let track = engine.run();
        let pitches: Vec<u8> = track.tape().notes().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![62]);
    }

    #[test]
    fn test_stop_and_clear() {
        let (tx, rx) = unbounded();
        let engine = Engine::new(LooperTrack::new(Vec::new(), BAR), ClockState::new(), rx);

        tx.send(midi(&[MIDI_START])).unwrap();
        tx.send(Command::StartRecording).unwrap();
        tx.send(midi(&[0x90, 60, 100])).unwrap();
        for command in clocks(10) {
            tx.send(command).unwrap();
        }
        tx.send(midi(&[MIDI_STOP])).unwrap();
        tx.send(Command::Clear).unwrap();
        tx.send(Command::Shutdown).unwrap();

        let track = engine.run();
        assert!(!track.is_playing());
        assert!(track.tape().is_empty());
        // Live note on, then silenced by the stop
        assert_eq!(
            track.sink().last(),
            Some(&NoteEvent::Off { pitch: 60 })
        );
    }
}
