//! Tape contents table.
//!
//! Renders a scrollable table of the notes on the tape, oldest first, with
//! columns for pitch, velocity and the note's on/off positions in the loop.

use iced::widget::{column, container, row, scrollable, text, Column};
use iced::{Background, Border, Color, Element, Length, Theme};

use tape_looper::midi::note_name;
use tape_looper::position::Position;
use tape_looper::tape::RecordedNote;

/// Column widths for consistent table layout.
const COL_INDEX_WIDTH: f32 = 40.0;
const COL_NOTE_WIDTH: f32 = 70.0;
const COL_VEL_WIDTH: f32 = 50.0;
const COL_POS_WIDTH: f32 = 80.0;
const ROW_HEIGHT: f32 = 28.0;

/// Loop position as `beat.sixteenth`, both 1-indexed.
pub fn format_position(pos: Position, loop_beats: u64) -> String {
    let sixteenths = (u64::from(pos) * loop_beats * 4) >> 16;
    format!("{}.{}", sixteenths / 4 + 1, sixteenths % 4 + 1)
}

/// Row highlighting colors.
fn row_background(is_sounding: bool, is_newest: bool) -> Color {
    if is_sounding {
        Color::from_rgb(0.15, 0.45, 0.15) // Green
    } else if is_newest {
        Color::from_rgb(0.5, 0.35, 0.1) // Orange
    } else {
        Color::from_rgb(0.12, 0.12, 0.12) // Dark grey
    }
}

fn header_color() -> Color {
    Color::from_rgb(0.7, 0.7, 0.7)
}

fn cell_color() -> Color {
    Color::from_rgb(0.9, 0.9, 0.9)
}

fn cell<'a, M: 'a>(label: String, width: f32, size: f32, color: Color) -> Element<'a, M> {
    container(text(label).size(size).color(color))
        .width(Length::Fixed(width))
        .padding([4, 8])
        .center_y(Length::Fixed(ROW_HEIGHT))
        .into()
}

fn view_table_header<'a, M: 'a>() -> Element<'a, M> {
    let hdr_color = header_color();

    container(
        row![
            cell("#".to_string(), COL_INDEX_WIDTH, 12.0, hdr_color),
            cell("NOTE".to_string(), COL_NOTE_WIDTH, 12.0, hdr_color),
            cell("VEL".to_string(), COL_VEL_WIDTH, 12.0, hdr_color),
            cell("ON".to_string(), COL_POS_WIDTH, 12.0, hdr_color),
            cell("OFF".to_string(), COL_POS_WIDTH, 12.0, hdr_color),
        ]
        .spacing(2),
    )
    .style(|_theme: &Theme| container::Style {
        background: Some(Background::Color(Color::from_rgb(0.08, 0.08, 0.08))),
        border: Border::default().rounded(2),
        ..Default::default()
    })
    .into()
}

fn view_note_row<'a, M: 'a>(
    index: usize,
    note: &RecordedNote,
    loop_beats: u64,
    is_sounding: bool,
    is_newest: bool,
) -> Element<'a, M> {
    let bg_color = row_background(is_sounding, is_newest);
    let txt_color = cell_color();
    let off = match note.off_pos {
        Some(pos) => format_position(pos, loop_beats),
        None => "held".to_string(),
    };

    container(
        row![
            cell((index + 1).to_string(), COL_INDEX_WIDTH, 14.0, txt_color),
            cell(note_name(note.pitch), COL_NOTE_WIDTH, 14.0, txt_color),
            cell(note.velocity.to_string(), COL_VEL_WIDTH, 14.0, txt_color),
            cell(format_position(note.on_pos, loop_beats), COL_POS_WIDTH, 14.0, txt_color),
            cell(off, COL_POS_WIDTH, 14.0, txt_color),
        ]
        .spacing(2),
    )
    .style(move |_theme: &Theme| container::Style {
        background: Some(Background::Color(bg_color)),
        border: Border::default().rounded(2),
        ..Default::default()
    })
    .height(Length::Fixed(ROW_HEIGHT))
    .into()
}

/// Build the scrollable table of tape notes.
///
/// Notes sounding at `position` are highlighted, as is the newest note.
pub fn view_tape_table<'a, M: 'a>(
    notes: &[RecordedNote],
    position: Position,
    loop_beats: u64,
) -> Element<'a, M> {
    let rows: Vec<Element<'a, M>> = notes
        .iter()
        .enumerate()
        .map(|(index, note)| {
            view_note_row(
                index,
                note,
                loop_beats,
                note.is_sounding_at(position),
                index + 1 == notes.len(),
            )
        })
        .collect();

    let table_content = column![view_table_header(), Column::with_children(rows).spacing(2)]
        .spacing(4)
        .padding(8);

    scrollable(table_content)
        .height(Length::Fixed(340.0))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_position() {
        // 2 bars of 4/4
        assert_eq!(format_position(0, 8), "1.1");
        assert_eq!(format_position(0x2000, 8), "2.1");
        assert_eq!(format_position(0x0800, 8), "1.2");
        assert_eq!(format_position(u16::MAX, 8), "8.4");
    }
}
