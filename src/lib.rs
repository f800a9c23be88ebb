//! A MIDI note looper built around a fixed-capacity tape of notes.
//!
//! [`tape::Tape`] holds the recorded notes and plays them back as the loop
//! position advances. [`looper::LooperTrack`] drives one tape from the MIDI
//! clock and live keyboard, and [`engine::Engine`] owns the track on its own
//! thread, fed through a command queue.

pub mod clock;
pub mod config;
pub mod engine;
pub mod looper;
pub mod midi;
pub mod position;
pub mod tape;
