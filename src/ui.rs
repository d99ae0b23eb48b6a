use std::sync::OnceLock;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use regex::Regex;
use parley::{Message, Role};
use crate::app::{App, InputMode};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        let Some(len) = after_open.find("**").filter(|&len| len > 0) else {
            break;
        };

        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after_open[..len].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after_open[len + 2..];
    }

    // No closing ** is left as literal text
    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

/// Content that opens with a `<table` tag is drawn as a table.
pub fn is_table(content: &str) -> bool {
    content
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<table"))
}

/// A table pulled out of HTML markup: cell text only, tags stripped.
#[derive(Debug, PartialEq, Eq)]
pub struct HtmlTable {
    pub has_header: bool,
    pub rows: Vec<Vec<String>>,
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("valid regex"))
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(t[hd])\b[^>]*>(.*?)</t[hd]\s*>").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn cell_text(html: &str) -> String {
    let stripped = tag_re().replace_all(html, "");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_html_table(content: &str) -> HtmlTable {
    let mut has_header = false;
    let mut rows = Vec::new();

    for (i, row) in row_re().captures_iter(content).enumerate() {
        let mut cells = Vec::new();
        let mut all_th = true;
        for cell in cell_re().captures_iter(&row[1]) {
            all_th &= cell[1].eq_ignore_ascii_case("th");
            cells.push(cell_text(&cell[2]));
        }
        if cells.is_empty() {
            continue;
        }
        if i == 0 && all_th {
            has_header = true;
        }
        rows.push(cells);
    }

    HtmlTable { has_header, rows }
}

fn table_lines(table: &HtmlTable) -> Vec<Line<'static>> {
    let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let border = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    for (r, row) in table.rows.iter().enumerate() {
        let is_header = table.has_header && r == 0;
        let cell_style = if is_header {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let mut spans = Vec::new();
        for (i, width) in widths.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", border));
            }
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            spans.push(Span::styled(format!("{:<width$}", cell, width = *width), cell_style));
        }
        lines.push(Line::from(spans));

        if is_header {
            let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            lines.push(Line::from(Span::styled(rule.join("─┼─"), border)));
        }
    }
    lines
}

fn message_lines(msg: &Message) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let timestamp = msg.timestamp().format("%H:%M").to_string();

    let (label, color) = match msg.role() {
        Role::User => ("You", Color::Cyan),
        Role::Assistant => ("AI", Color::Yellow),
    };
    lines.push(Line::from(vec![
        Span::styled(format!("{}:", label), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {}", timestamp), Style::default().fg(Color::DarkGray)),
    ]));

    if is_table(msg.content()) {
        let table = parse_html_table(msg.content());
        if table.rows.is_empty() {
            lines.extend(msg.content().lines().map(|l| Line::from(l.to_string())));
        } else {
            lines.extend(table_lines(&table));
        }
    } else {
        match msg.role() {
            Role::User => lines.extend(msg.content().lines().map(|l| Line::from(l.to_string()))),
            Role::Assistant => lines.extend(msg.content().lines().map(parse_markdown_line)),
        }
    }

    lines.push(Line::default());
    lines
}

/// Rows the paragraph occupies once word-wrapped to `width`, as ratatui lays it out
fn wrapped_height(paragraph: &Paragraph, width: u16) -> u16 {
    paragraph.line_count(width).min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let error_height = if app.exchange.error().is_some() { 1 } else { 0 };

    let [header_area, chat_area, error_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(error_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if let Some(error) = app.exchange.error() {
        let line = Paragraph::new(Span::styled(
            format!(" {} ", error),
            Style::default().fg(Color::White).bg(Color::Red),
        ));
        frame.render_widget(line, error_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let count = app.exchange.transcript().len();
    let title = Line::from(vec![
        Span::styled(" parley ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{} messages]", count), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let endpoint = app
        .exchange
        .config()
        .endpoint
        .clone()
        .unwrap_or_else(|| "no endpoint configured".to_string());
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(format!(" {} ", endpoint));

    let busy = app.is_busy();
    let messages = app.exchange.transcript().all();

    let lines: Vec<Line> = if messages.is_empty() && !busy {
        vec![Line::from(Span::styled(
            "Type a message and press Enter...",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        let mut lines: Vec<Line> = messages.iter().flat_map(message_lines).collect();
        if busy {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        lines
    };

    // Inner size minus borders
    let inner_width = area.width.saturating_sub(2);
    app.chat_height = area.height.saturating_sub(2);
    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let total_lines = wrapped_height(&paragraph, inner_width);
    app.max_scroll = total_lines.saturating_sub(app.chat_height);
    if app.follow_bottom {
        app.scroll = app.max_scroll;
    } else {
        app.scroll = app.scroll.min(app.max_scroll);
    }

    let chat = paragraph.block(chat_block).scroll((app.scroll, 0));
    frame.render_widget(chat, area);

    if app.max_scroll > 0 {
        let mut scrollbar_state = ScrollbarState::new(app.max_scroll as usize)
            .position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if app.is_busy() {
        Color::DarkGray
    } else if editing {
        Color::Yellow
    } else {
        Color::Gray
    };

    let title = if app.is_busy() { " Waiting for reply... " } else { " Message " };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .exchange
        .input()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " SCROLL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        InputMode::Normal => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley::{ChatBackend, ChatError, Config, CsvExporter, Exchange};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_is_table_detection() {
        assert!(is_table("<table><tr><td>1</td></tr></table>"));
        assert!(is_table("  \n<TABLE border=1>"));
        assert!(!is_table("Here is a table: <table>"));
        assert!(!is_table("<tab"));
        assert!(!is_table(""));
    }

    #[test]
    fn test_parse_html_table_with_header() {
        let html = "<table>\n<tr><th>Name</th><th>Qty</th></tr>\n\
                    <tr><td>Apples &amp; pears</td><td><b>3</b></td></tr>\n</table>";
        let table = parse_html_table(html);
        assert!(table.has_header);
        assert_eq!(
            table.rows,
            vec![
                vec!["Name".to_string(), "Qty".to_string()],
                vec!["Apples & pears".to_string(), "3".to_string()],
            ]
        );
    }

    #[test]
    fn test_table_lines_align_columns() {
        let table = HtmlTable {
            has_header: true,
            rows: vec![
                vec!["a".into(), "bb".into()],
                vec!["ccc".into(), "d".into()],
            ],
        };
        let lines: Vec<String> = table_lines(&table).iter().map(line_text).collect();
        assert_eq!(lines, vec!["a   │ bb", "────┼───", "ccc │ d "]);
    }

    #[test]
    fn test_table_without_rows_falls_back_to_text() {
        let msg = Message::assistant("<table></table>");
        let lines: Vec<String> = message_lines(&msg).iter().map(line_text).collect();
        assert_eq!(lines[1], "<table></table>");
    }

    #[test]
    fn test_markdown_bold() {
        let line = parse_markdown_line("a **b** c **unclosed");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[2].content, " c **unclosed");
    }

    #[test]
    fn test_wrapped_height_breaks_at_words() {
        // 19 chars in a width of 10 is two rows by count, three once words wrap
        let paragraph = Paragraph::new(Text::from(vec![
            Line::from("abcdefg abcdefg abc"),
            Line::default(),
        ]))
        .wrap(Wrap { trim: false });
        assert_eq!(wrapped_height(&paragraph, 10), 3 + 1);
    }

    struct Canned(String);

    #[async_trait]
    impl ChatBackend for Canned {
        async fn send(&self, _endpoint: &str, _credential: &str, _message: &str) -> Result<String, ChatError> {
            Ok(self.0.clone())
        }
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_follow_bottom_shows_end_of_wrapped_reply() {
        let reply = format!("{} LASTWORD", vec!["abcdefg"; 8].join(" "));
        let config = Config {
            endpoint: Some("http://localhost/chat".into()),
            api_key: Some("k".into()),
            ..Config::default()
        };
        let backend = Arc::new(Canned(reply));
        let mut exchange = Exchange::new(config, backend, CsvExporter::disabled());
        exchange.submit("hi").await.unwrap();
        let mut app = App::new(exchange);

        let mut terminal = Terminal::new(TestBackend::new(12, 14)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen = screen_text(&terminal);
        assert!(app.follow_bottom);
        assert!(
            screen.contains("LASTWORD"),
            "end of the newest reply is off screen (scroll={} max={}):\n{}",
            app.scroll,
            app.max_scroll,
            screen
        );
    }
}
