//! UI renderer implementation.
//!
//! Contains the top-level [render] entry point used by the terminal loop and the column
//! layout shared with mouse hit-testing ([column_at]).
//!
//! Rendering only reads the session: path line, column header, the listing window, the
//! status line, and whatever overlay is on top.

use crate::app::Session;
use crate::core::cache::Entry;
use crate::core::formatter::{format_cell, right_align, sanitize_to_exact_width};
use crate::core::sort::{SortField, SortSpec};
use crate::ui::overlays::Overlay;
use crate::utils::helpers::shorten_home_path;

use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

/// Fixed width of every column but the name.
fn column_width(key: char) -> u16 {
    match key {
        '*' => 1,
        's' => 9,
        'p' => 10,
        'm' | 'c' | 'a' => 16,
        'r' => 6,
        _ => 0,
    }
}

fn column_label(key: char) -> &'static str {
    match key {
        '*' => "*",
        'n' => "Name",
        's' => "Size",
        'p' => "Perms",
        'm' => "Modified",
        'c' => "Changed",
        'a' => "Accessed",
        'r' => "Rank",
        _ => "",
    }
}

/// Lays the columns out left to right as `(key, x, width)`, one space apart.
///
/// The name column takes whatever the fixed columns leave over. Columns that would start past
/// the right edge are dropped and the last one is cut to fit.
pub fn column_layout(columns: &str, width: u16) -> Vec<(char, u16, u16)> {
    let fixed: u16 = columns
        .chars()
        .map(column_width)
        .fold(0u16, u16::saturating_add);
    let gaps = columns.chars().count().saturating_sub(1) as u16;
    let name_width = width.saturating_sub(fixed).saturating_sub(gaps).max(1);

    let mut layout = Vec::with_capacity(columns.len());
    let mut x = 0u16;
    for key in columns.chars() {
        if x >= width {
            break;
        }
        let w = if key == 'n' {
            name_width
        } else {
            column_width(key)
        };
        layout.push((key, x, w.min(width - x)));
        x = x.saturating_add(w).saturating_add(1);
    }
    layout
}

/// Column key under screen column `x`; gaps count toward the column on their left.
pub fn column_at(columns: &str, width: u16, x: u16) -> Option<char> {
    column_layout(columns, width)
        .into_iter()
        .take_while(|&(_, start, _)| start <= x)
        .last()
        .map(|(key, _, _)| key)
}

/// Render function which draws the entire browser on each frame.
pub fn render(frame: &mut Frame, session: &Session) {
    let area = frame.area();
    if area.height == 0 || area.width == 0 {
        return;
    }
    let state = session.state();
    let layout = column_layout(state.columns(), area.width);

    draw_path_line(frame, session, row(area, 0));
    if area.height > 1 {
        draw_header(frame, &layout, state.sort(), row(area, 1));
    }

    let accent = Style::default().fg(Color::Cyan);
    let selected_style = Style::default().fg(Color::Yellow);
    let cursor_style = Style::default().add_modifier(Modifier::REVERSED);
    let dir_style = Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD);

    let rows = area.height.saturating_sub(3) as usize;
    let window = state.files().iter().enumerate().skip(state.scroll()).take(rows);
    for (offset, (i, &id)) in window.enumerate() {
        let entry = state.entry(id);
        let mut style = if entry.is_dir() {
            dir_style
        } else {
            Style::default()
        };
        if entry.is_selected() {
            style = style.patch(selected_style);
        }
        if i == state.cursor() {
            style = style.patch(cursor_style);
        }
        let line = Line::from(Span::styled(listing_line(entry, &layout, area.width), style));
        frame.render_widget(Paragraph::new(line), row(area, 2 + offset as u16));
    }

    if area.height > 2 {
        draw_status_line(frame, session, row(area, area.height - 1));
    }

    match session.overlays().top() {
        Some(Overlay::Warning { text }) => draw_warning(frame, text),
        Some(Overlay::Help) => draw_help(frame, session, accent),
        None => {}
    }
}

fn row(area: Rect, y: u16) -> Rect {
    Rect {
        x: area.x,
        y: area.y + y,
        width: area.width,
        height: 1,
    }
}

fn listing_line(entry: &Entry, layout: &[(char, u16, u16)], width: u16) -> String {
    let mut line = String::with_capacity(width as usize);
    for &(key, x, w) in layout {
        let pad = (x as usize).saturating_sub(line.width());
        line.push_str(&" ".repeat(pad));
        let cell = format_cell(entry, key);
        match key {
            's' | 'r' => line.push_str(&right_align(&cell, w as usize)),
            _ => line.push_str(&sanitize_to_exact_width(&cell, w as usize)),
        }
    }
    sanitize_to_exact_width(&line, width as usize)
}

/// Draws the directory at the left and the job/selection counters at the right.
fn draw_path_line(frame: &mut Frame, session: &Session, area: Rect) {
    let state = session.state();
    let path = shorten_home_path(state.path());

    let mut counters = Vec::new();
    if !state.jobs().is_empty() {
        counters.push(format!("jobs: {}", state.jobs().len()));
    }
    if state.nselected() > 0 {
        counters.push(format!("selected: {}", state.nselected()));
    }
    let counters = counters.join(" | ");

    let path_width = (area.width as usize).saturating_sub(counters.width() + 1);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            sanitize_to_exact_width(&path, path_width),
            Style::default().add_modifier(Modifier::BOLD),
        ))),
        area,
    );
    if !counters.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(counters)).alignment(Alignment::Right),
            area,
        );
    }
}

/// Column labels, with an arrow on every column that is also a sort key.
fn draw_header(frame: &mut Frame, layout: &[(char, u16, u16)], sort: &SortSpec, area: Rect) {
    let mut line = String::new();
    for &(key, x, w) in layout {
        let pad = (x as usize).saturating_sub(line.width());
        line.push_str(&" ".repeat(pad));
        let mut label = column_label(key).to_string();
        if let Some(descending) = SortField::from_char(key).and_then(|f| sort.direction_of(f)) {
            label.push(if descending { '↓' } else { '↑' });
        }
        line.push_str(&sanitize_to_exact_width(&label, w as usize));
    }
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            line,
            Style::default().add_modifier(Modifier::UNDERLINED),
        ))),
        area,
    );
}

fn draw_status_line(frame: &mut Frame, session: &Session, area: Rect) {
    let state = session.state();
    let position = if state.nfiles() == 0 {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.cursor() + 1, state.nfiles())
    };
    let left = match session.status() {
        Some(status) => format!("{} | sort {} | {}", state.globs(), state.sort(), status),
        None => format!("{} | sort {}", state.globs(), state.sort()),
    };

    let style = Style::default().fg(Color::DarkGray);
    frame.render_widget(Paragraph::new(Line::from(Span::styled(left, style))), area);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(position, style))).alignment(Alignment::Right),
        area,
    );
}

/// Centered rectangle of at most `width` x `height`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Blocking warning banner across the middle of the screen.
fn draw_warning(frame: &mut Frame, text: &str) {
    let area = frame.area();
    let inner_width = area.width.saturating_sub(6).max(1);
    let lines = text.width().div_ceil(inner_width as usize).max(1) as u16;
    let rect = centered(area, inner_width + 2, lines + 3);

    let block = Block::default()
        .title(" Warning ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let body = Text::from(vec![
        Line::from(text.to_string()),
        Line::from(Span::styled(
            "press any key",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(body).block(block).wrap(Wrap { trim: false }),
        rect,
    );
}

/// Help menu: one row per binding description, with every key bound to it.
fn draw_help(frame: &mut Frame, session: &Session, accent: Style) {
    let area = frame.area();
    let entries = session.keymap().help_entries();
    let key_width = entries
        .iter()
        .map(|(keys, _)| keys.width())
        .max()
        .unwrap_or(0)
        .min(30);

    let key_style = accent.add_modifier(Modifier::BOLD);
    let rows: Vec<Line> = entries
        .into_iter()
        .map(|(keys, description)| {
            Line::from(vec![
                Span::styled(sanitize_to_exact_width(&keys, key_width), key_style),
                Span::raw("  "),
                Span::raw(description),
            ])
        })
        .collect();

    let rect = centered(
        area,
        area.width.saturating_sub(6).clamp(40, 90),
        area.height.saturating_sub(4),
    );
    let block = Block::default()
        .title(" Keybinds ")
        .borders(Borders::ALL)
        .border_style(accent);
    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(Text::from(rows)).block(block), rect);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_column_takes_the_remaining_width() {
        let layout = column_layout("*smpn", 80);
        assert_eq!(
            layout,
            vec![
                ('*', 0, 1),
                ('s', 2, 9),
                ('m', 12, 16),
                ('p', 29, 10),
                ('n', 40, 40),
            ]
        );
    }

    #[test]
    fn narrow_terminals_drop_trailing_columns() {
        let layout = column_layout("*mpn", 20);
        assert_eq!(layout, vec![('*', 0, 1), ('m', 2, 16), ('p', 19, 1)]);
    }

    #[test]
    fn hit_testing_follows_the_layout() {
        assert_eq!(column_at("*smpn", 80, 0), Some('*'));
        assert_eq!(column_at("*smpn", 80, 1), Some('*'));
        assert_eq!(column_at("*smpn", 80, 5), Some('s'));
        assert_eq!(column_at("*smpn", 80, 29), Some('p'));
        assert_eq!(column_at("*smpn", 80, 79), Some('n'));
    }
}
