//! A looper track: one tape, its playhead and the live keyboard.
//!
//! The track turns clock counts into loop positions, records live notes onto
//! the tape while recording is armed, and plays the tape back through its
//! note sink. Keys still held on the keyboard are remembered by pitch so their
//! note-off can be matched to the note the tape recorded.

use tracing::{debug, info};

use crate::position::{position_at, Position, LOOP_END};
use crate::tape::{NoteHandle, NoteSink, RecordedNote, Tape};

const PITCH_COUNT: usize = 128;

/// What a key pressed while recording is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeldKey {
    Up,
    Recorded(NoteHandle),
    /// Still down, but its sound was already cut. The release is swallowed.
    Silenced,
}

/// Status of a track, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackStatus {
    pub playing: bool,
    pub recording: bool,
    pub position: Position,
    pub note_count: usize,
    pub capacity: usize,
    /// Tape contents, oldest first
    pub notes: Vec<RecordedNote>,
}

pub struct LooperTrack<S: NoteSink> {
    tape: Tape,
    sink: S,
    length_clocks: u64,
    position: Position,
    playing: bool,
    recording: bool,
    monitor_input: bool,
    held: [HeldKey; PITCH_COUNT],
}

impl<S: NoteSink> LooperTrack<S> {
    pub fn new(sink: S, length_clocks: u64) -> Self {
        Self {
            tape: Tape::new(),
            sink,
            length_clocks,
            position: LOOP_END,
            playing: false,
            recording: false,
            monitor_input: true,
            held: [HeldKey::Up; PITCH_COUNT],
        }
    }

    /// Whether incoming notes are heard while not recording.
    pub fn with_monitor_input(mut self, monitor_input: bool) -> Self {
        self.monitor_input = monitor_input;
        self
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn status(&self) -> TrackStatus {
        TrackStatus {
            playing: self.playing,
            recording: self.recording,
            position: self.position,
            note_count: self.tape.len(),
            capacity: self.tape.capacity(),
            notes: self.tape.notes().collect(),
        }
    }

    /// Start playback from the top of the loop.
    pub fn start(&mut self) {
        self.position = LOOP_END;
        self.tape.reset_heads();
        self.playing = true;
    }

    /// Resume playback where the clock left off.
    pub fn resume(&mut self) {
        self.playing = true;
    }

    /// Stop playback and silence everything the track is sounding.
    pub fn stop(&mut self) {
        self.silence_everything();
        self.playing = false;
    }

    /// Follow the clock to `clock_count`, playing whatever became due.
    pub fn tick(&mut self, clock_count: u64) {
        let new_position = position_at(clock_count, self.length_clocks);
        if new_position == self.position {
            return;
        }
        self.tape
            .advance(&mut self.sink, self.position, new_position, self.playing);
        self.position = new_position;
    }

    /// Arm recording. Playback starts too if the transport was idle.
    pub fn start_recording(&mut self) {
        if !self.playing {
            self.start();
        }
        self.recording = true;
        info!(notes = self.tape.len(), "looper recording");
    }

    pub fn stop_recording(&mut self) {
        self.recording = false;
        info!(notes = self.tape.len(), "looper recording finished");
    }

    pub fn note_on(&mut self, pitch: u8, velocity: u8) {
        let key = usize::from(pitch & 0x7F);
        if !self.recording {
            if self.monitor_input {
                self.sink.note_on(pitch, velocity);
            }
            return;
        }

        // Retriggered while still down: close the previous take first
        if let HeldKey::Recorded(previous) = self.held[key] {
            self.close(pitch, previous);
        }

        let playback_owned = self.playback_owned_keys();
        let handle = self
            .tape
            .record_note_on(&mut self.sink, self.position, pitch, velocity);
        self.mark_silenced(playback_owned);

        self.sink.note_on(pitch, velocity);
        self.held[key] = HeldKey::Recorded(handle);
    }

    pub fn note_off(&mut self, pitch: u8) {
        let key = usize::from(pitch & 0x7F);
        match std::mem::replace(&mut self.held[key], HeldKey::Up) {
            HeldKey::Recorded(handle) => self.close(pitch, handle),
            HeldKey::Silenced => {}
            HeldKey::Up if self.monitor_input => self.sink.note_off(pitch),
            HeldKey::Up => {}
        }
    }

    pub fn remove_oldest_note(&mut self) {
        let playback_owned = self.playback_owned_keys();
        self.tape.remove_oldest_note(&mut self.sink, self.position);
        self.mark_silenced(playback_owned);
    }

    pub fn remove_newest_note(&mut self) {
        let playback_owned = self.playback_owned_keys();
        self.tape.remove_newest_note(&mut self.sink, self.position);
        self.mark_silenced(playback_owned);
    }

    /// Drop the whole tape and silence everything.
    pub fn clear(&mut self) {
        self.silence_everything();
        self.tape.remove_all();
        debug!("looper tape cleared");
    }

    /// Held keys whose note playback has closed. Such a note sounds all loop,
    /// so the tape silences it when it is evicted or removed.
    fn playback_owned_keys(&self) -> Vec<usize> {
        (0..PITCH_COUNT)
            .filter(|&key| match self.held[key] {
                HeldKey::Recorded(handle) => self
                    .tape
                    .note(handle)
                    .is_some_and(|note| note.off_pos.is_some()),
                _ => false,
            })
            .collect()
    }

    /// Swallow the release of keys whose note has just left the tape.
    fn mark_silenced(&mut self, keys: Vec<usize>) {
        for key in keys {
            if let HeldKey::Recorded(handle) = self.held[key] {
                if self.tape.note(handle).is_none() {
                    self.held[key] = HeldKey::Silenced;
                }
            }
        }
    }

    fn close(&mut self, pitch: u8, handle: NoteHandle) {
        if self.tape.record_note_off(self.position, handle) {
            self.sink.note_off(pitch);
        }
    }

    /// Close every held key's note and send one note-off per pitch that is
    /// sounding, from playback or from a held key.
    fn silence_everything(&mut self) {
        let mut silence = [false; PITCH_COUNT];
        if self.playing {
            for note in self.tape.notes() {
                if note.is_sounding_at(self.position) {
                    silence[usize::from(note.pitch & 0x7F)] = true;
                }
            }
        }
        for (key, held) in self.held.iter_mut().enumerate() {
            if let HeldKey::Recorded(handle) = *held {
                if self.tape.record_note_off(self.position, handle) {
                    silence[key] = true;
                }
                *held = HeldKey::Silenced;
            }
        }
        for (key, _) in silence.iter().enumerate().filter(|(_, s)| **s) {
            self.sink.note_off(key as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::NoteEvent;

    /// 1 bar at 24 ppqn
    const BAR: u64 = 96;

    fn on(pitch: u8) -> NoteEvent {
        NoteEvent::On {
            pitch,
            velocity: 100,
        }
    }

    fn off(pitch: u8) -> NoteEvent {
        NoteEvent::Off { pitch }
    }

    fn track() -> LooperTrack<Vec<NoteEvent>> {
        let mut track = LooperTrack::new(Vec::new(), BAR);
        track.start();
        track
    }

    fn run(track: &mut LooperTrack<Vec<NoteEvent>>, clocks: std::ops::RangeInclusive<u64>) {
        for clock in clocks {
            track.tick(clock);
        }
    }

    fn take(track: &mut LooperTrack<Vec<NoteEvent>>) -> Vec<NoteEvent> {
        std::mem::take(track.sink_mut())
    }

    #[test]
    fn test_monitor_passes_notes_through() {
        let mut track = track();
        track.note_on(60, 100);
        track.note_off(60);
        assert_eq!(take(&mut track), vec![on(60), off(60)]);
        assert!(track.tape().is_empty());
    }

    #[test]
    fn test_monitor_off_swallows_notes() {
        let mut track = track().with_monitor_input(false);
        track.note_on(60, 100);
        track.note_off(60);
        assert!(take(&mut track).is_empty());
    }

    #[test]
    fn test_recorded_note_plays_back_next_loop() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=40);
        track.note_off(60);
        track.stop_recording();
        assert_eq!(take(&mut track), vec![on(60), off(60)]);

        run(&mut track, 41..=BAR + 40);
        assert_eq!(take(&mut track), vec![on(60), off(60)]);
        assert_eq!(track.status().note_count, 1);
    }

    #[test]
    fn test_note_on_clock_zero_plays_after_start() {
        let mut track = track();
        track.start_recording();
        track.tick(0);
        track.note_on(60, 100);
        track.tick(12);
        track.note_off(60);
        take(&mut track);

        run(&mut track, 13..=BAR - 1);
        track.start();
        track.tick(0);
        assert_eq!(take(&mut track), vec![on(60)]);
    }

    #[test]
    fn test_note_held_over_loop_is_not_repeated() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=BAR + 20);
        // Still sounding from the live key; its off now belongs to playback
        assert_eq!(take(&mut track), vec![on(60)]);

        track.note_off(60);
        assert!(take(&mut track).is_empty());

        run(&mut track, BAR + 21..=2 * BAR + 10);
        assert_eq!(take(&mut track), vec![off(60), on(60)]);
    }

    #[test]
    fn test_key_released_after_recording_still_closes_note() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        track.stop_recording();
        run(&mut track, 11..=30);
        track.note_off(60);
        assert_eq!(take(&mut track), vec![on(60), off(60)]);
        assert_eq!(track.tape().notes().next().unwrap().off_pos, Some(position_at(30, BAR)));
    }

    #[test]
    fn test_stop_silences_sounding_notes() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=40);
        track.note_off(60);
        track.note_on(64, 90);
        track.stop_recording();
        run(&mut track, 41..=BAR + 20);
        take(&mut track);

        track.stop();
        let events = take(&mut track);
        assert!(events.contains(&off(60)));
        assert!(events.contains(&off(64)));
        assert!(!track.is_playing());
    }

    #[test]
    fn test_stopped_track_moves_silently() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=20);
        track.note_off(60);
        track.stop_recording();
        track.stop();
        take(&mut track);

        run(&mut track, 21..=BAR + 40);
        assert!(take(&mut track).is_empty());

        track.resume();
        run(&mut track, BAR + 41..=2 * BAR + 40);
        assert_eq!(take(&mut track), vec![on(60), off(60)]);
    }

    #[test]
    fn test_start_recording_starts_playback() {
        let mut track = LooperTrack::new(Vec::new(), BAR);
        assert!(!track.is_playing());
        track.start_recording();
        assert!(track.is_playing());
        assert!(track.is_recording());
    }

    #[test]
    fn test_remove_commands() {
        let mut track = track();
        track.start_recording();
        for (i, pitch) in [60u8, 62, 64].into_iter().enumerate() {
            let at = i as u64 * 20;
            run(&mut track, at..=at + 5);
            track.note_on(pitch, 100);
            run(&mut track, at + 6..=at + 10);
            track.note_off(pitch);
        }
        assert_eq!(track.status().note_count, 3);

        track.remove_oldest_note();
        track.remove_newest_note();
        let pitches: Vec<u8> = track.tape().notes().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![62]);
    }

    #[test]
    fn test_clear_silences_and_empties() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=40);
        track.note_off(60);
        track.note_on(67, 100);
        run(&mut track, 41..=BAR + 20);
        take(&mut track);

        track.clear();
        let events = take(&mut track);
        assert!(events.contains(&off(60)));
        assert!(events.contains(&off(67)));
        assert!(track.tape().is_empty());

        run(&mut track, BAR + 21..=3 * BAR);
        assert!(take(&mut track).is_empty());

        // Silenced by the clear already
        track.note_off(67);
        assert!(take(&mut track).is_empty());
    }

    #[test]
    fn test_clear_sends_one_off_for_key_held_over_loop() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=BAR + 20);
        take(&mut track);

        track.clear();
        track.note_off(60);
        assert_eq!(take(&mut track), vec![off(60)]);
    }

    #[test]
    fn test_stop_sends_one_off_per_pitch() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=BAR + 20);
        take(&mut track);

        track.stop();
        track.note_off(60);
        assert_eq!(take(&mut track), vec![off(60)]);
    }

    #[test]
    fn test_removing_key_held_over_loop_sends_one_off() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=BAR + 20);
        take(&mut track);

        track.remove_newest_note();
        track.note_off(60);
        assert_eq!(take(&mut track), vec![off(60)]);
        assert!(track.tape().is_empty());
    }

    #[test]
    fn test_removing_open_note_leaves_release_to_key() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=20);
        take(&mut track);

        track.remove_oldest_note();
        assert!(take(&mut track).is_empty());
        track.note_off(60);
        assert_eq!(take(&mut track), vec![off(60)]);
    }

    #[test]
    fn test_evicted_key_held_over_loop_is_silenced_once() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=BAR + 20);

        let capacity = track.tape().capacity() as u64;
        for i in 0..capacity {
            let pitch = 70 + i as u8;
            track.note_on(pitch, 100);
            track.tick(BAR + 21 + i);
            track.note_off(pitch);
        }
        assert!(track.tape().notes().all(|n| n.pitch != 60));

        track.note_off(60);
        let offs = take(&mut track).into_iter().filter(|e| *e == off(60)).count();
        assert_eq!(offs, 1);
    }

    #[test]
    fn test_retriggered_key_closes_previous_take() {
        let mut track = track();
        track.start_recording();
        run(&mut track, 0..=10);
        track.note_on(60, 100);
        run(&mut track, 11..=20);
        track.note_on(60, 80);
        run(&mut track, 21..=30);
        track.note_off(60);
        let offs: Vec<_> = track.tape().notes().map(|n| n.off_pos.is_some()).collect();
        assert_eq!(offs, vec![true, true]);
    }
}
