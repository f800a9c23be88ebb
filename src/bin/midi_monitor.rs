//! MIDI Monitor - Console tool for checking what the looper will receive.
//!
//! Prints each incoming message with a wall-clock timestamp, the raw bytes
//! and how the looper decodes it.
//!
//! Usage: cargo run --bin midi_monitor -- [--port <name>] [--duration <secs>]

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use midir::MidiInput;
use midly::live::LiveEvent;
use midly::MidiMessage;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tape_looper::config::LooperConfig;
use tape_looper::midi::{find_port, note_name, InputEvent};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let preferred = match flag("--port") {
        Some(port) => port,
        None => LooperConfig::load(LooperConfig::default_path())
            .map(|c| c.input_port)
            .unwrap_or_else(|_| LooperConfig::default().input_port),
    };
    let duration_secs: Option<u64> = flag("--duration").and_then(|s| s.parse().ok());

    let midi_in = MidiInput::new("midi-monitor").context("failed to create MIDI input")?;

    println!("Available MIDI input ports:");
    for (i, port) in midi_in.ports().iter().enumerate() {
        let name = midi_in.port_name(port).unwrap_or_else(|_| "Unknown".to_string());
        println!("  {}: {}", i, name);
    }
    println!();

    let (port, port_name) =
        find_port(&midi_in, &preferred).ok_or_else(|| anyhow!("no MIDI input ports found"))?;
    info!("connecting to {}", port_name);
    println!("{:<14} {:<16} {:<12} {}", "TIME", "TYPE", "DATA (HEX)", "DETAILS");
    println!("{}", "-".repeat(72));

    let _connection = midi_in
        .connect(
            &port,
            "midi-monitor-in",
            move |_timestamp, message, _| print_midi_message(message),
            (),
        )
        .map_err(|e| anyhow!("failed to connect to {}: {}", port_name, e))?;

    if let Some(secs) = duration_secs {
        println!("\nMonitoring for {} seconds...\n", secs);
        std::thread::sleep(Duration::from_secs(secs));
    } else {
        println!("\nPress Enter to quit (or use --duration <secs>)...\n");
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
    }
    Ok(())
}

fn print_midi_message(message: &[u8]) {
    if message.is_empty() {
        return;
    }

    let hex_str: String = message.iter().map(|b| format!("{:02X} ", b)).collect();
    let (msg_type, details) = describe(message);
    let now = Local::now().format("%H:%M:%S%.3f");

    println!("{:<14} {:<16} {:<12} {}", now, msg_type, hex_str.trim(), details);
    // Output may be piped
    let _ = io::stdout().flush();
}

fn describe(message: &[u8]) -> (&'static str, String) {
    match InputEvent::parse(message) {
        InputEvent::NoteOn {
            channel,
            pitch,
            velocity,
        } => (
            "NOTE_ON",
            format!("Ch:{} Note:{} Vel:{}", channel + 1, note_name(pitch), velocity),
        ),
        InputEvent::NoteOff { channel, pitch } => (
            "NOTE_OFF",
            format!("Ch:{} Note:{}", channel + 1, note_name(pitch)),
        ),
        InputEvent::Clock => ("CLOCK", "MIDI Clock pulse (24 ppqn)".to_string()),
        InputEvent::Start => ("START", "Start playback from beginning".to_string()),
        InputEvent::Continue => ("CONTINUE", "Continue playback".to_string()),
        InputEvent::Stop => ("STOP", "Stop playback".to_string()),
        InputEvent::Other => describe_other(message),
    }
}

/// Messages the looper ignores, decoded for display only.
fn describe_other(message: &[u8]) -> (&'static str, String) {
    match LiveEvent::parse(message) {
        Ok(LiveEvent::Midi { channel, message }) => {
            let channel = channel.as_int() + 1;
            match message {
                MidiMessage::Controller { controller, value } => (
                    "CONTROL_CHANGE",
                    format!("Ch:{} CC:{} Val:{}", channel, controller.as_int(), value.as_int()),
                ),
                MidiMessage::ProgramChange { program } => {
                    ("PROGRAM_CHANGE", format!("Ch:{} Prog:{}", channel, program.as_int()))
                }
                MidiMessage::PitchBend { bend } => {
                    ("PITCH_BEND", format!("Ch:{} Val:{}", channel, bend.as_int()))
                }
                MidiMessage::Aftertouch { key, vel } => (
                    "POLY_PRESSURE",
                    format!("Ch:{} Note:{} Val:{}", channel, note_name(key.as_int()), vel.as_int()),
                ),
                MidiMessage::ChannelAftertouch { vel } => {
                    ("CHANNEL_PRESSURE", format!("Ch:{} Val:{}", channel, vel.as_int()))
                }
                _ => ("CHANNEL", format!("Ch:{}", channel)),
            }
        }
        Ok(LiveEvent::Common(_)) => ("COMMON", format!("{} bytes", message.len())),
        Ok(LiveEvent::Realtime(_)) => ("REALTIME", String::new()),
        Err(_) => ("UNKNOWN", format!("Status: 0x{:02X}", message[0])),
    }
}
