use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
};
use consulta_core::{ChatMessage, ChatRole, Source};
use crate::app::App;

const EMPTY_HINT: &str = "Empezá preguntando por carreras, becas, aranceles o fechas.";
const INPUT_PLACEHOLDER: &str = "Escribe tu mensaje…";
const MAX_INPUT_LINES: u16 = 5;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let input_lines = (app.input.text().split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);

    // Main layout: header, conversation, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(input_lines + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_conversation(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = if app.pending() {
        Span::styled(" ● pensando ", Style::default().fg(Color::Yellow))
    } else {
        Span::styled(" ● listo ", Style::default().fg(Color::Green))
    };

    let header = Line::from(vec![
        Span::styled(
            " UCC · Asistente ",
            Style::default().fg(Color::White).bg(Color::Indexed(61)).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", app.session.endpoint()),
            Style::default().fg(Color::DarkGray),
        ),
        status,
    ]);

    frame.render_widget(Paragraph::new(header), area);
}

/// Every visual line of the conversation, before wrapping.
pub fn conversation_lines(messages: &[ChatMessage], pending: bool, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    if messages.is_empty() && !pending {
        lines.push(Line::from(Span::styled(
            EMPTY_HINT,
            Style::default().fg(Color::DarkGray),
        )));
        return lines;
    }

    for msg in messages {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "Tú:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                for line in msg.text.split('\n') {
                    lines.push(Line::from(line.to_string()));
                }
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "UCC:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                for line in msg.text.split('\n') {
                    lines.push(parse_markdown_line(line));
                }
                for (i, source) in msg.sources.iter().enumerate() {
                    lines.extend(source_lines(i + 1, source));
                }
            }
        }
        lines.push(Line::default());
    }

    if pending {
        lines.push(Line::from(Span::styled(
            "UCC:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize % 3) + 1);
        lines.push(Line::from(Span::styled(
            format!("pensando{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn source_lines(number: usize, source: &Source) -> Vec<Line<'static>> {
    let detail = Style::default().fg(Color::DarkGray);
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("  [{}] ", number), Style::default().fg(Color::Magenta)),
        Span::styled(source.heading(), Style::default().add_modifier(Modifier::BOLD)),
    ])];

    if let Some(locator) = source.locator() {
        lines.push(Line::from(Span::styled(format!("      {}", locator), detail)));
    }
    if let Some(period) = source.period() {
        lines.push(Line::from(Span::styled(format!("      Período: {}", period), detail)));
    }

    lines
}

/// Word-wrap a styled line to `width` columns.
///
/// Leading indentation is repeated on every row, runs of spaces collapse to
/// one, and words wider than a row are split.
fn wrap_line(line: &Line<'_>, width: usize) -> Vec<Line<'static>> {
    let chars: Vec<(char, Style)> = line
        .spans
        .iter()
        .flat_map(|span| span.content.chars().map(move |c| (c, span.style)))
        .collect();

    let indent_len = chars.iter().take_while(|(c, _)| *c == ' ').count();
    let indent_len = if indent_len + 1 >= width { 0 } else { indent_len };
    let indent = &chars[..indent_len];
    let avail = width.saturating_sub(indent_len).max(1);

    let mut rows: Vec<Vec<(char, Style)>> = Vec::new();
    let mut current: Vec<(char, Style)> = Vec::new();

    for word in chars[indent_len..].split(|(c, _)| c.is_whitespace()) {
        if word.is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + 1 + word.len() > avail {
            rows.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push((' ', Style::default()));
        }

        let mut rest = word;
        while current.len() + rest.len() > avail {
            let (head, tail) = rest.split_at(avail - current.len());
            current.extend_from_slice(head);
            rows.push(std::mem::take(&mut current));
            rest = tail;
        }
        current.extend_from_slice(rest);
    }

    if !current.is_empty() || rows.is_empty() {
        rows.push(current);
    }

    rows.into_iter()
        .map(|row| {
            let mut styled = indent.to_vec();
            styled.extend(row);
            styled_line(&styled).patch_style(line.style)
        })
        .collect()
}

/// Merge runs of equally styled characters back into spans.
fn styled_line(chars: &[(char, Style)]) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut text = String::new();
    let mut style = None;

    for &(c, s) in chars {
        if style.is_some_and(|current| current != s) && !text.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut text), style.unwrap_or_default()));
        }
        style = Some(s);
        text.push(c);
    }
    if !text.is_empty() {
        spans.push(Span::styled(text, style.unwrap_or_default()));
    }

    Line::from(spans)
}

/// The rows the conversation pane actually draws at `width` columns.
pub fn wrap_lines(lines: &[Line<'_>], width: u16) -> Vec<Line<'static>> {
    let width = width.max(1) as usize;
    lines.iter().flat_map(|line| wrap_line(line, width)).collect()
}

fn render_conversation(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let lines = conversation_lines(app.session.messages(), app.pending(), app.animation_frame);

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let rows = wrap_lines(&lines, inner_width);
    let total = rows.len().min(u16::MAX as usize) as u16;

    app.max_scroll = total.saturating_sub(inner_height);
    if app.follow_bottom {
        app.chat_scroll = app.max_scroll;
    } else {
        app.chat_scroll = app.chat_scroll.min(app.max_scroll);
    }

    let title = if app.follow_bottom || app.max_scroll == 0 {
        " Conversación ".to_string()
    } else {
        format!(" Conversación (↑ {}) ", app.max_scroll - app.chat_scroll)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);

    let chat = Paragraph::new(Text::from(rows))
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let sending = app.input.is_sending();
    let border_color = if sending { Color::DarkGray } else { Color::Yellow };
    let title = if sending { " Enviando… " } else { " Mensaje " };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;

    // Cursor line/column from the character cursor
    let before_cursor: String = app.input.text().chars().take(app.input.cursor()).collect();
    let cursor_line = before_cursor.matches('\n').count();
    let cursor_col = before_cursor
        .rsplit('\n')
        .next()
        .map(|s| s.chars().count())
        .unwrap_or(0);

    // Keep the cursor visible vertically and horizontally
    let row_offset = if inner_height == 0 {
        0
    } else {
        (cursor_line + 1).saturating_sub(inner_height)
    };
    let col_offset = if inner_width == 0 {
        0
    } else {
        (cursor_col + 1).saturating_sub(inner_width)
    };

    let text = if app.input.text().is_empty() {
        Text::from(Span::styled(INPUT_PLACEHOLDER, Style::default().fg(Color::DarkGray)))
    } else {
        let visible: Vec<Line> = app
            .input
            .text()
            .split('\n')
            .skip(row_offset)
            .take(inner_height.max(1))
            .map(|line| Line::from(line.chars().skip(col_offset).take(inner_width).collect::<String>()))
            .collect();
        Text::from(visible)
    };

    let style = if sending {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };
    frame.render_widget(Paragraph::new(text).style(style).block(block), area);

    if !sending && inner_width > 0 && inner_height > 0 {
        let x = (cursor_col - col_offset) as u16;
        let y = (cursor_line - row_offset) as u16;
        frame.set_cursor_position((area.x + 1 + x, area.y + 1 + y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Cyan);
    let sep = Span::styled(" · ", Style::default().fg(Color::DarkGray));

    let mut spans = Vec::new();
    if app.input.can_submit() {
        spans.push(Span::styled("Enter", key));
        spans.push(Span::raw(" enviar"));
        spans.push(sep.clone());
    }
    spans.extend([
        Span::styled("Shift+Enter", key),
        Span::raw(" nueva línea"),
        sep.clone(),
        Span::styled("PgUp/PgDn", key),
        Span::raw(" desplazar"),
        sep,
        Span::styled("Esc", key),
        Span::raw(" salir"),
    ]);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
