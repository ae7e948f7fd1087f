use std::time::Instant;

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::block::Title;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, FormField, NoteForm};
use crate::note::{ModalMode, Note};

const SPINNER_FRAMES: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

/// Everything the renderer needs besides the view state.
pub struct Chrome<'a> {
    pub today: &'a str,
    pub tick: usize,
    pub now: Instant,
}

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState, chrome: &Chrome) {
    let screen = frame.size();
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(screen);

    draw_header(frame, state, chrome, vertical[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(34), Constraint::Percentage(66)])
        .split(vertical[1]);

    draw_list(frame, state, list_state, chrome, columns[0]);
    if state.modal_open {
        draw_form(frame, state, chrome, columns[1]);
    } else {
        draw_detail(frame, state.selected_note(), columns[1]);
    }

    frame.render_widget(build_status_line(state), vertical[2]);

    if state.modal_open && state.delete_confirm_pending {
        draw_delete_confirmation(frame, state, screen);
    }
    draw_notifications(frame, state, chrome, screen);
}

fn draw_header(frame: &mut Frame, state: &AppState, chrome: &Chrome, area: Rect) {
    let add_style = if state.modal_open || state.loading {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    };
    let block = Block::default().borders(Borders::ALL).title("Notes");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(inner);
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("[+]", add_style),
            Span::raw(" Add note (a)"),
        ])),
        halves[0],
    );
    frame.render_widget(
        Paragraph::new(chrome.today.to_string()).alignment(Alignment::Right),
        halves[1],
    );
}

fn draw_list(
    frame: &mut Frame,
    state: &AppState,
    list_state: &mut ListState,
    chrome: &Chrome,
    area: Rect,
) {
    let block_style = if state.modal_open {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let block = Block::default()
        .title(format!("All notes ({})", state.len()))
        .borders(Borders::ALL)
        .border_style(block_style);

    if state.loading {
        let spinner = Paragraph::new(format!("{} Loading…", spinner_frame(chrome.tick)))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(spinner, area);
        return;
    }

    let text_width = area.width.saturating_sub(4) as usize;
    let dim = state.modal_open;
    let mut items: Vec<ListItem> = state
        .notes
        .iter()
        .map(|note| list_item(note, text_width, dim))
        .collect();
    if items.is_empty() {
        items.push(ListItem::new("No notes yet. Press `a` to create one."));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, area, list_state);
}

fn list_item(note: &Note, width: usize, dim: bool) -> ListItem<'static> {
    let (title_style, description_style) = if dim {
        (
            Style::default().fg(Color::DarkGray),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (
            Style::default().add_modifier(Modifier::BOLD),
            Style::default().fg(Color::Gray),
        )
    };
    let first_line = note.description().lines().next().unwrap_or_default();
    ListItem::new(vec![
        Line::from(Span::styled(truncate_to_width(note.title(), width), title_style)),
        Line::from(Span::styled(
            truncate_to_width(first_line, width),
            description_style,
        )),
    ])
}

fn draw_detail(frame: &mut Frame, note: &Note, area: Rect) {
    let block = Block::default()
        .title("Note")
        .title(Title::from("e: edit").alignment(Alignment::Right))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if note.is_placeholder() {
        frame.render_widget(
            Paragraph::new("Select a note to see its contents.")
                .style(Style::default().fg(Color::Gray)),
            inner,
        );
        return;
    }

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let mut lines = vec![
        Line::from(Span::styled(
            note.title().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(
        note.description()
            .lines()
            .map(|line| Line::from(line.to_string())),
    );
    frame.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
        sections[0],
    );

    if let Some(metadata) = metadata_line(note) {
        frame.render_widget(
            Paragraph::new(metadata).style(Style::default().fg(Color::Gray)),
            sections[1],
        );
    }
}

/// Only shown once the server has stamped both timestamps.
fn metadata_line(note: &Note) -> Option<String> {
    let created = note.created_label()?;
    let updated = note.updated_label()?;
    Some(format!("Created: {created}   Updated: {updated}"))
}

fn draw_form(frame: &mut Frame, state: &AppState, chrome: &Chrome, area: Rect) {
    let block = Block::default()
        .title(state.modal_mode.heading())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    if state.loading {
        frame.render_widget(
            Paragraph::new(format!("{} Saving…", spinner_frame(chrome.tick)))
                .alignment(Alignment::Center),
            inner,
        );
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(inner);

    let form = &state.form;
    frame.render_widget(
        form_field("Title", &form.title, form.focus == FormField::Title),
        rows[0],
    );
    frame.render_widget(
        form_field(
            "Description",
            &form.description,
            form.focus == FormField::Description,
        ),
        rows[1],
    );
    frame.render_widget(Paragraph::new(form_buttons(state.modal_mode, form)), rows[2]);

    if !state.delete_confirm_pending {
        let field_area = match form.focus {
            FormField::Title => rows[0],
            FormField::Description => rows[1],
        };
        let value = form.focused_value();
        let last_line = value.rsplit('\n').next().unwrap_or_default();
        let line_index = value.matches('\n').count() as u16;
        let column = (last_line.width() as u16).min(field_area.width.saturating_sub(3));
        let x = field_area.x + 1 + column;
        let y = field_area.y + 1 + line_index.min(field_area.height.saturating_sub(3));
        frame.set_cursor(x, y);
    }
}

fn form_field<'a>(label: &'a str, value: &'a str, focused: bool) -> Paragraph<'a> {
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let content = if value.is_empty() {
        Text::from(Span::styled("Required", Style::default().fg(Color::DarkGray)))
    } else {
        Text::from(value)
    };
    Paragraph::new(content).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(label)
            .borders(Borders::ALL)
            .border_style(border_style),
    )
}

fn form_buttons(mode: ModalMode, form: &NoteForm) -> Line<'static> {
    let submit_style = if form.can_submit() {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mut spans = vec![
        Span::styled("[Ctrl-s] Submit", submit_style),
        Span::raw("  "),
        Span::raw("[Esc] Cancel"),
    ];
    if mode == ModalMode::Edit {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "[Ctrl-d] Delete",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn draw_delete_confirmation(frame: &mut Frame, state: &AppState, area: Rect) {
    let popup = centered_rect(50, 30, area);
    frame.render_widget(Clear, popup);
    let title = state.selected_note().title();
    let text = Text::from(vec![
        Line::from("Are you sure you want to delete this note?"),
        Line::from(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                "[y/Enter] Delete",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::raw("[n/Esc] Cancel"),
        ]),
    ]);
    let body = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title("Confirm Delete")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    frame.render_widget(body, popup);
}

fn draw_notifications(frame: &mut Frame, state: &AppState, chrome: &Chrome, area: Rect) {
    let width = (area.width / 3).max(24).min(area.width);
    let ttl = state.notifications.ttl();
    let mut y = area.y + 1;
    for toast in state.notifications.iter().rev() {
        let height = 4;
        if y + height > area.y + area.height {
            break;
        }
        let rect = Rect::new(area.x + area.width - width, y, width, height);
        let color = Color::Red;
        let bar_width = width.saturating_sub(2) as usize;
        let remaining = 1.0 - toast.elapsed_ratio(chrome.now, ttl);
        let filled = ((bar_width as f64) * remaining).round() as usize;
        let text = Text::from(vec![
            Line::from(truncate_to_width(&toast.message, bar_width)),
            Line::from(Span::styled(
                "▔".repeat(filled.min(bar_width)),
                Style::default().fg(color),
            )),
        ]);
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(text).block(
                Block::default()
                    .title("Error")
                    .title(Title::from("x").alignment(Alignment::Right))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            ),
            rect,
        );
        y += height;
    }
}

fn build_status_line(state: &AppState) -> Paragraph<'static> {
    let hints = if state.delete_confirm_pending {
        "y confirm delete • n cancel • Ctrl-x dismiss"
    } else if state.modal_open {
        "Tab switch field • Ctrl-s submit • Esc cancel • Ctrl-x dismiss"
    } else {
        "j/k move • a add • e edit • Ctrl-r reload • x dismiss • q quit"
    };
    let mut lines = vec![Line::from(Span::styled(
        hints,
        Style::default().fg(Color::Gray),
    ))];
    if let Some(message) = &state.status_message {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }
    Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::TOP))
}

pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

/// Cuts `text` to at most `width` columns, ending in `…` when shortened.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let w = grapheme.width();
        if used + w + 1 > width {
            break;
        }
        out.push_str(grapheme);
        used += w;
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
