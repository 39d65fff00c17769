use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use saab_core::ChatRole;

use crate::app::App;
use crate::markup::{parse_markdown_line, to_display_text, wrap_text_to_width};

const PRODUCT_NAME: &str = "Doctor Saab";
const INPUT_PLACEHOLDER: &str = "Type your message...";
const SEND_LABEL: &str = "Send";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: topbar, chat, input row, footer
    let [topbar_area, chat_area, input_row, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_topbar(frame, topbar_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_row);
    render_footer(app, frame, footer_area);
}

fn render_topbar(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" \u{2695} ", Style::default().bg(Color::Blue).fg(Color::White).bold()),
        Span::styled(format!(" {PRODUCT_NAME} "), Style::default().fg(Color::Blue).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn role_label(role: ChatRole) -> Line<'static> {
    match role {
        ChatRole::User => Line::from(Span::styled(
            "You",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Right),
        ChatRole::System => Line::from(Span::styled(
            PRODUCT_NAME,
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        )),
    }
}

/// Re-open a `**` run that a wrap cut in half, so each line parses on its own.
fn carry_bold_across_lines(lines: Vec<String>) -> Vec<String> {
    let mut open = false;
    lines
        .into_iter()
        .map(|line| {
            let mut line = if open { format!("**{line}") } else { line };
            open = line.matches("**").count() % 2 == 1;
            if open {
                line.push_str("**");
            }
            line
        })
        .collect()
}

/// Build the chat log as already-wrapped lines, so the line count is exact.
pub(crate) fn chat_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in app.conversation.messages() {
        // The empty placeholder stays hidden until its first token
        if msg.text.is_empty() {
            continue;
        }

        let alignment = match msg.role {
            ChatRole::User => Alignment::Right,
            ChatRole::System => Alignment::Left,
        };

        lines.push(role_label(msg.role));
        for paragraph in to_display_text(&msg.text).lines() {
            let wrapped = carry_bold_across_lines(wrap_text_to_width(paragraph, width));
            for line in wrapped {
                lines.push(parse_markdown_line(&line).alignment(alignment));
            }
        }
        lines.push(Line::default());
    }

    if app.is_loading() {
        lines.push(role_label(ChatRole::System));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("typing{dots}"),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    // Inner size minus borders
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let lines = chat_lines(app, app.chat_width as usize);
    app.sync_chat_scroll(lines.len());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let send_width = (SEND_LABEL.len() + 4) as u16;
    let [input_area, send_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(send_width)]).areas(area);

    app.send_area = Some(send_area);

    let loading = app.is_loading();
    let border_color = if loading { Color::DarkGray } else { Color::Yellow };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Scroll offset keeps the cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled(
            INPUT_PLACEHOLDER,
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        let style = if loading {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Paragraph::new(visible_text).style(style)
    };

    frame.render_widget(input.block(input_block), input_area);

    let send_style = if loading {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White).bg(Color::Blue).bold()
    };
    let send = Paragraph::new(Span::styled(format!(" {SEND_LABEL} "), send_style))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color)),
        );
    frame.render_widget(send, send_area);

    // Cursor only while input is accepted
    if !loading && inner_width > 0 {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = if app.is_loading() {
        (" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let spans = vec![
        Span::styled(mode_text, mode_style),
        Span::raw(" "),
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
        Span::raw(" "),
        Span::styled(
            if app.is_scrolled_to_bottom() { "" } else { "[more below] " },
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            app.client.base_url().to_string(),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
