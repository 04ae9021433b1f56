use crate::app::{App, Mode};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Text},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use throbber_widgets_tui::Throbber;

pub fn ui(f: &mut Frame, app: &mut App) {
    let size = f.area();

    if app.show_help {
        let block = Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded);
        let area = centered_rect(60, 60, size);
        f.render_widget(Clear, area);
        let help_text = "Controls:\n\nGeneral:\n Ctrl+n: New Chat\n Ctrl+h: Toggle Session Panel\n Ctrl+t: Toggle History Replay\n Ctrl+o: Model Select\n F1: Help\n\nInsert Mode:\n Enter: Send Message\n Shift+Enter: New Line\n Esc: Normal Mode\n\nNormal Mode:\n j/k: Scroll\n i: Insert Mode\n q: Quit\n\nSession Panel (Normal Mode):\n Up/Down: Move\n Enter: Switch Session";
        f.render_widget(Paragraph::new(help_text).block(block), area);
        return;
    }

    let (sidebar_area, main_area) = if app.show_history {
        let split = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(26), Constraint::Min(1)])
            .split(size);
        (Some(split[0]), split[1])
    } else {
        (None, size)
    };

    if let Some(area) = sidebar_area {
        render_session_panel(f, app, area);
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(1),    // Messages
            Constraint::Length((3 + app.input.lines().len().saturating_sub(1) as u16).min(10)),
        ])
        .split(main_area);

    render_header(f, app, chunks[0]);
    render_messages(f, app, chunks[1]);
    render_input(f, app, chunks[2]);

    if app.mode == Mode::ModelSelect {
        render_model_select(f, app, size);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let replay = if app.use_history { "on" } else { "off" };
    let title = format!(
        " confab - {} - history replay: {} (F1 for Help) ",
        app.selected_model, replay
    );

    let header = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().fg(Color::Cyan))
        .border_type(BorderType::Rounded);
    f.render_widget(header, area);
}

fn render_session_panel(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .title(" Sessions (Enter: Switch) ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);

    let current = app.sessions.current_id();
    let items: Vec<ListItem> = app
        .sessions
        .iter()
        .enumerate()
        .map(|(i, session)| {
            let style = if session.id == current {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let text = if session.id == current {
                format!("Chat {} (current)", i + 1)
            } else {
                format!("Chat {}", i + 1)
            };
            ListItem::new(Span::styled(text, style))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    f.render_stateful_widget(list, area, &mut app.session_list_state);
}

fn render_messages(f: &mut Frame, app: &mut App, area: Rect) {
    let width = area.width;
    let bubble_max_width = (width as f32 * 0.70) as u16;

    if app.messages.is_empty() && !app.loading {
        let empty_text = "Start a conversation by typing a message below.\n(Ctrl+o: Model, Ctrl+n: New Chat, Ctrl+h: Sessions)";
        let p = Paragraph::new(empty_text)
            .alignment(ratatui::layout::Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        let centered = centered_rect(80, 50, area);
        f.render_widget(p, centered);
    }

    // Every bubble's height is needed up front for correct scrolling.
    // (height, text, is_user, title)
    let mut bubbles: Vec<(u16, Option<Text>, bool, String)> = Vec::new();
    let mut total_height: u16 = 0;

    for msg in &app.messages {
        let text = if msg.is_user {
            Text::from(msg.text.clone())
        } else {
            tui_markdown::from_str(&msg.text)
        };
        let content_width = bubble_max_width.saturating_sub(2);
        let height = estimate_wrapped_height(&text, content_width) + 2;
        let title = if msg.is_user {
            format!(" You {} ", msg.timestamp)
        } else {
            format!(" AI {} ", msg.timestamp)
        };
        bubbles.push((height, Some(text), msg.is_user, title));
        total_height += height;
    }

    if app.loading {
        bubbles.push((3, None, false, " AI ".to_string()));
        total_height += 3;
    }

    // One blank line between bubbles.
    if !bubbles.is_empty() {
        total_height += (bubbles.len() as u16).saturating_sub(1);
    }

    let viewport_height = area.height;
    if app.auto_scroll {
        app.vertical_scroll = total_height.saturating_sub(viewport_height);
    } else {
        let max_scroll = total_height.saturating_sub(viewport_height);
        if app.vertical_scroll > max_scroll {
            app.vertical_scroll = max_scroll;
        }
    }

    let mut current_y = -(app.vertical_scroll as i32);

    for (height, text_opt, is_user, title) in bubbles {
        if current_y + (height as i32) > 0 && current_y < (viewport_height as i32) {
            let bubble_width = bubble_max_width;
            let x = if is_user {
                width.saturating_sub(bubble_width)
            } else {
                0
            };

            let area_top = area.y;
            let area_bottom = area.bottom();

            let item_top = area_top as i32 + current_y;
            let item_bottom = item_top + height as i32;

            let visible_top = item_top.max(area_top as i32);
            let visible_bottom = item_bottom.min(area_bottom as i32);

            if visible_bottom > visible_top {
                let visible_height = (visible_bottom - visible_top) as u16;
                let visible_y = visible_top as u16;

                let rect = Rect::new(area.x + x, visible_y, bubble_width, visible_height);

                let border_color = if is_user { Color::Green } else { Color::Cyan };
                let block = Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(border_color))
                    .title(title);

                if let Some(text) = text_opt {
                    let scroll_offset = if item_top < area_top as i32 {
                        (area_top as i32 - item_top) as u16
                    } else {
                        0
                    };
                    let p = Paragraph::new(text)
                        .block(block)
                        .wrap(Wrap { trim: false })
                        .scroll((scroll_offset, 0));
                    f.render_widget(p, rect);
                } else {
                    let throbber = Throbber::default().label("Thinking...").throbber_style(
                        Style::default()
                            .fg(Color::LightCyan)
                            .add_modifier(Modifier::BOLD),
                    );
                    f.render_widget(block, rect);
                    let inner = Rect {
                        x: rect.x + 1,
                        y: rect.y + 1,
                        width: rect.width.saturating_sub(2),
                        height: rect.height.saturating_sub(2),
                    };
                    f.render_stateful_widget(throbber, inner, &mut app.spinner_state);
                }
            }
        }
        current_y += height as i32 + 1;
    }
}

fn render_input(f: &mut Frame, app: &mut App, area: Rect) {
    let (border_color, title) = match app.mode {
        Mode::Insert => (
            Color::Green,
            " Input (Insert Mode) - Esc for Normal ".to_string(),
        ),
        Mode::Normal => (Color::Blue, " Input (Normal Mode) - i to Type ".to_string()),
        Mode::ModelSelect => (Color::Magenta, " Select Model ".to_string()),
    };

    match app.mode {
        Mode::Insert => app.input.set_style(Style::default()),
        _ => app
            .input
            .set_style(Style::default().add_modifier(Modifier::DIM)),
    }

    app.input.set_block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color)),
    );
    f.render_widget(&app.input, area);
}

fn render_model_select(f: &mut Frame, app: &App, size: Rect) {
    let area = centered_rect(60, 40, size);
    f.render_widget(Clear, area);

    let block = Block::default()
        .title(" Select Model (Enter: Confirm, Esc: Cancel) ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);

    if app.models.is_empty() {
        let p = Paragraph::new("No models available.\nIs the Ollama server running?")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(p, area);
        return;
    }

    let items: Vec<ListItem> = app
        .models
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let s = if i == app.model_cursor {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(m.as_str(), s))
        })
        .collect();
    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn estimate_wrapped_height(text: &Text, width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let mut height = 0;
    for line in &text.lines {
        let line_width = line.width() as u16;
        if line_width == 0 {
            height += 1;
        } else {
            height += (line_width as f32 / width as f32).ceil() as u16;
        }
    }
    height
}
