//! MIDI Looper - records notes against an external MIDI clock and loops them.
//!
//! This application connects to a MIDI input for clock and notes (preferring
//! the configured port, IAC Driver by default) and a MIDI output for playback.
//! It shows the transport state, BPM, bar/beat position and the notes on tape.

mod ui;

use crossbeam_channel::Sender;
use iced::time::{self, milliseconds};
use iced::widget::{button, column, container, row, text};
use iced::{Center, Element, Fill, Subscription, Theme};
use midir::MidiInput;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tape_looper::clock::ClockState;
use tape_looper::config::LooperConfig;
use tape_looper::engine::{Command, Engine, SharedStatus};
use tape_looper::looper::LooperTrack;
use tape_looper::midi::{find_port, MidiError, MidiOut, BEATS_PER_BAR};

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    iced::application(Looper::new, Looper::update, Looper::view)
        .title("MIDI Looper")
        .subscription(Looper::subscription)
        .theme(Looper::theme)
        .run()
}

struct Looper {
    clock_state: ClockState,
    status: SharedStatus,
    commands: Sender<Command>,
    loop_beats: u64,
    midi_connected: bool,
    port_name: String,
    output_name: Option<String>,
    _midi_connection: Option<midir::MidiInputConnection<()>>,
}

#[derive(Debug, Clone, Copy)]
enum Message {
    Tick,
    ToggleRecording,
    RemoveOldest,
    RemoveNewest,
    Clear,
}

impl Looper {
    fn new() -> Self {
        let config = LooperConfig::load(LooperConfig::default_path()).unwrap_or_else(|e| {
            warn!("{}; using default config", e);
            LooperConfig::default()
        });

        let output = match MidiOut::connect(&config.output_port, config.channel_index()) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!("no MIDI output, playback is silent: {}", e);
                None
            }
        };
        let output_name = output.as_ref().map(|o| o.port_name.clone());

        let track = LooperTrack::new(output, config.loop_length_clocks())
            .with_monitor_input(config.monitor_input);
        let clock_state = ClockState::new();
        let (commands, receiver) = crossbeam_channel::unbounded();
        let engine = Engine::new(track, clock_state.clone(), receiver);
        let status = engine.status();
        std::thread::spawn(move || {
            engine.run();
        });

        let (midi_connection, port_name) = match start_midi_listener(&config.input_port, commands.clone()) {
            Ok((connection, name)) => (Some(connection), name),
            Err(e) => {
                error!("MIDI input unavailable: {}", e);
                (None, e.to_string())
            }
        };

        Self {
            clock_state,
            status,
            commands,
            loop_beats: u64::from(config.loop_length_bars) * BEATS_PER_BAR,
            midi_connected: midi_connection.is_some(),
            port_name,
            output_name,
            _midi_connection: midi_connection,
        }
    }

    fn update(&mut self, message: Message) {
        let command = match message {
            // State is updated by the engine thread, just trigger re-render
            Message::Tick => return,
            Message::ToggleRecording => {
                if self.is_recording() {
                    Command::StopRecording
                } else {
                    Command::StartRecording
                }
            }
            Message::RemoveOldest => Command::RemoveOldest,
            Message::RemoveNewest => Command::RemoveNewest,
            Message::Clear => Command::Clear,
        };
        if self.commands.send(command).is_err() {
            error!("looper engine is gone");
        }
    }

    fn is_recording(&self) -> bool {
        self.status.lock().map(|s| s.recording).unwrap_or(false)
    }

    fn view(&self) -> Element<'_, Message> {
        let (bar, beat) = self.clock_state.get_position();
        let bpm = self.clock_state.get_bpm();
        let running = self.clock_state.is_running();
        let track = self
            .status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();

        let status = if running { "▶ PLAYING" } else { "⏹ STOPPED" };
        let status_color = if running {
            iced::Color::from_rgb(0.2, 0.8, 0.2)
        } else {
            iced::Color::from_rgb(0.6, 0.6, 0.6)
        };

        let connection_status = if self.midi_connected {
            format!("🎵 {}", self.port_name)
        } else {
            "❌ No MIDI input".to_string()
        };
        let output_status = match &self.output_name {
            Some(name) => format!("🔊 {}", name),
            None => "❌ No MIDI output".to_string(),
        };

        let record_label = if track.recording { "⏺ Stop rec" } else { "⏺ Record" };
        let record_color = if track.recording {
            iced::Color::from_rgb(0.9, 0.2, 0.2)
        } else {
            iced::Color::from_rgb(0.6, 0.6, 0.6)
        };

        let controls = row![
            button(text(record_label)).on_press(Message::ToggleRecording),
            button(text("Remove oldest")).on_press(Message::RemoveOldest),
            button(text("Remove newest")).on_press(Message::RemoveNewest),
            button(text("Clear")).on_press(Message::Clear),
        ]
        .spacing(8);

        let content = column![
            text("MIDI Looper").size(40),
            text(connection_status).size(16),
            text(output_status).size(16),
            text("").size(10),
            text(status).size(30).color(status_color),
            text(format!("BPM: {:.1}", bpm)).size(40),
            text(format!("Bar {} · Beat {}", bar, beat)).size(30),
            text("").size(10),
            text(format!("Notes {}/{}", track.note_count, track.capacity))
                .size(20)
                .color(record_color),
            controls,
            ui::tape_table::view_tape_table(&track.notes, track.position, self.loop_beats),
        ]
        .spacing(4)
        .align_x(Center);

        container(content)
            .width(Fill)
            .height(Fill)
            .center_x(Fill)
            .center_y(Fill)
            .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        time::every(milliseconds(50)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

impl Default for Looper {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Looper {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Forward every message from the preferred input port to the engine.
fn start_midi_listener(
    preferred: &str,
    commands: Sender<Command>,
) -> Result<(midir::MidiInputConnection<()>, String), MidiError> {
    let midi_in = MidiInput::new("looper-in")?;
    let (port, port_name) = find_port(&midi_in, preferred).ok_or(MidiError::NoPorts("input"))?;

    let connection = midi_in
        .connect(
            &port,
            "looper-in",
            move |_timestamp, message, _| {
                // Engine gone means we are shutting down
                let _ = commands.send(Command::Midi(message.to_vec()));
            },
            (),
        )
        .map_err(|e| MidiError::Connect {
            port: port_name.clone(),
            reason: e.to_string(),
        })?;

    info!("MIDI input connected to: {}", port_name);
    Ok((connection, port_name))
}
