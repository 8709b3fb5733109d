use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::Marker,
    text::{Line, Span, Text},
    widgets::{
        canvas::{Canvas, Circle, Line as CanvasLine, Points},
        Block, BorderType, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
    Frame,
};

use rag_chat_core::particles::{LINK_END_COLOR, NODE_COLOR};
use rag_chat_core::{ChatRole, ParticleField, Rgb};

use crate::app::App;

const BACKGROUND: Rgb = Rgb(0x0a, 0x0a, 0x14);
const PANEL_BG: Color = Color::Rgb(0x10, 0x10, 0x1c);
const NEON_CYAN: Color = Color::Rgb(0x00, 0xf0, 0xff);
const NEON_MAGENTA: Color = Color::Rgb(0xff, 0x00, 0xe6);
const MAX_PANEL_WIDTH: u16 = 100;
/// Links are drawn as this many segments to approximate the colour gradient.
const LINK_SEGMENTS: usize = 4;
const GLOW_OPACITY: f64 = 0.35;

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [body_area, footer_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

    match &app.background {
        Some(background) => render_background(&background.field, frame, body_area),
        None => frame.render_widget(Block::default().bg(color(BACKGROUND)), body_area),
    }

    let panel_width = body_area.width.saturating_sub(4).min(MAX_PANEL_WIDTH);
    let panel = Rect {
        x: body_area.x + (body_area.width - panel_width) / 2,
        y: body_area.y + body_area.height.min(1),
        width: panel_width,
        height: body_area.height.saturating_sub(2),
    };
    render_panel(app, frame, panel);

    render_footer(app, frame, footer_area);
}

fn render_background(field: &ParticleField, frame: &mut Frame, area: Rect) {
    let (width, height) = (field.width(), field.height());
    let nodes = field.nodes();
    let links = field.links();

    let canvas = Canvas::default()
        .background_color(color(BACKGROUND))
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(|ctx| {
            // Canvas y grows upwards; the field's grows downwards
            for link in &links {
                let (a, b) = (nodes[link.from], nodes[link.to]);
                for segment in 0..LINK_SEGMENTS {
                    let t0 = segment as f64 / LINK_SEGMENTS as f64;
                    let t1 = (segment + 1) as f64 / LINK_SEGMENTS as f64;
                    let tint = NODE_COLOR
                        .lerp(LINK_END_COLOR, (t0 + t1) / 2.0)
                        .over(BACKGROUND, link.opacity);
                    ctx.draw(&CanvasLine {
                        x1: a.x + (b.x - a.x) * t0,
                        y1: height - (a.y + (b.y - a.y) * t0),
                        x2: a.x + (b.x - a.x) * t1,
                        y2: height - (a.y + (b.y - a.y) * t1),
                        color: color(tint),
                    });
                }
            }
            ctx.layer();

            for node in nodes {
                ctx.draw(&Circle {
                    x: node.x,
                    y: height - node.y,
                    radius: node.radius * 3.0,
                    color: color(NODE_COLOR.over(BACKGROUND, GLOW_OPACITY)),
                });
            }
            ctx.layer();

            let centers: Vec<(f64, f64)> = nodes.iter().map(|n| (n.x, height - n.y)).collect();
            ctx.draw(&Points {
                coords: &centers,
                color: color(NODE_COLOR),
            });
        });

    frame.render_widget(canvas, area);
}

fn render_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    if area.width < 10 || area.height < 8 {
        return;
    }

    frame.render_widget(Clear, area);
    let panel_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(NEON_CYAN))
        .style(Style::default().bg(PANEL_BG));
    let inner = panel_block.inner(area);
    frame.render_widget(panel_block, area);

    let [header_area, chat_area, input_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(inner);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" ● ", Style::default().fg(Color::Green)),
        Span::styled("RAG", Style::default().fg(NEON_CYAN).bold()),
        Span::styled("CHAT", Style::default().fg(NEON_MAGENTA).bold()),
    ]);
    let session: String = app.conversation.id().chars().take(8).collect();
    let status = Line::from(vec![
        Span::styled("AI Assistant Online", Style::default().fg(Color::Gray)),
        Span::styled(format!("  session {} ", session), Style::default().fg(Color::DarkGray)),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [title_area, status_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(status.width() as u16),
    ])
    .areas(inner);
    frame.render_widget(Paragraph::new(title), title_area);
    frame.render_widget(Paragraph::new(status).alignment(Alignment::Right), status_area);
}

fn welcome_text(app: &App) -> Text<'static> {
    let hint = Style::default().fg(Color::Gray);
    Text::from(vec![
        Line::default(),
        Line::from(Span::styled("◢◤", Style::default().fg(NEON_CYAN).bold())),
        Line::from(Span::styled(
            "Welcome to RAG Chat BASS",
            Style::default().fg(Color::White).bold(),
        )),
        Line::from(Span::styled(
            app.welcome_reveal.display().into_owned(),
            Style::default().fg(NEON_MAGENTA),
        )),
        Line::default(),
        Line::from(Span::styled("💬 Ask me anything", hint)),
        Line::from(Span::styled("🔮 Context-aware responses", hint)),
        Line::from(Span::styled("⚡ Powered by Langflow", hint)),
    ])
    .alignment(Alignment::Center)
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for (index, msg) in app.conversation.messages().iter().enumerate() {
        let text = app.message_text(index);
        match msg.role {
            ChatRole::User => {
                lines.push(
                    Line::from(Span::styled(
                        "You",
                        Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD),
                    ))
                    .alignment(Alignment::Right),
                );
                for line in text.lines() {
                    lines.push(Line::from(line.to_string()).alignment(Alignment::Right));
                }
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "AI",
                    Style::default().fg(NEON_MAGENTA).add_modifier(Modifier::BOLD),
                )));
                for line in text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
        }
        lines.push(Line::default());
    }

    if app.conversation.is_awaiting() {
        lines.push(Line::from(Span::styled(
            "AI",
            Style::default().fg(NEON_MAGENTA).add_modifier(Modifier::BOLD),
        )));
        // Animated dots: cycles through one to three
        let dots = "● ".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            dots,
            Style::default().fg(NEON_CYAN),
        )));
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    if app.conversation.messages().is_empty() && !app.conversation.is_awaiting() {
        app.scroll = 0;
        app.max_scroll = 0;
        frame.render_widget(Paragraph::new(welcome_text(app)), area);
        return;
    }

    let text_area = Rect {
        width: area.width.saturating_sub(1), // room for the scrollbar
        ..area
    };
    let chat = Paragraph::new(Text::from(chat_lines(app))).wrap(Wrap { trim: false });
    // Rows after word wrapping, counted by the same wrapper that renders them
    let total = u16::try_from(chat.line_count(text_area.width)).unwrap_or(u16::MAX);

    app.max_scroll = total.saturating_sub(text_area.height);
    app.scroll = if app.follow {
        app.max_scroll
    } else {
        app.scroll.min(app.max_scroll)
    };

    frame.render_widget(chat.scroll((app.scroll, 0)), text_area);

    if app.max_scroll > 0 {
        let mut state = ScrollbarState::new(app.max_scroll as usize).position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .style(Style::default().fg(Color::DarkGray)),
            area,
            &mut state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let awaiting = app.conversation.is_awaiting();
    let (border_color, title) = if awaiting {
        (Color::DarkGray, " Waiting for reply... ")
    } else {
        (NEON_CYAN, " Message ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.input.is_empty() {
        Paragraph::new(Span::styled(
            "Type your message...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible_text: String = app
            .input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text).style(Style::default().fg(Color::White))
    };

    frame.render_widget(input.block(input_block), area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = if app.conversation.is_awaiting() {
        (" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" READY ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let esc_label = if app.reply_reveal.is_typing() {
        " skip "
    } else if !app.input.is_empty() {
        " clear "
    } else {
        " quit "
    };
    let background_label = if app.background.is_some() {
        " hide background "
    } else {
        " show background "
    };

    let hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(esc_label, label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" F2 ", key_style),
        Span::styled(background_label, label_style),
        Span::styled(" ^C ", key_style),
        Span::styled(" quit ", label_style),
    ];

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
    use crate::app::tests::test_app;
    use rag_chat_core::ChatMessage;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for row in buffer.content.chunks(buffer.area.width as usize) {
            for cell in row {
                text.push_str(cell.symbol());
            }
            text.push('\n');
        }
        text
    }

    #[tokio::test]
    async fn test_renders_welcome_panel() {
        let (mut app, _rx) = test_app(None);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("RAGCHAT"));
        assert!(text.contains("Welcome to RAG Chat BASS"));
        assert!(text.contains("Ask me anything"));
        assert!(text.contains("Type your message..."));
        assert!(text.contains("READY"));
    }

    #[tokio::test]
    async fn test_renders_conversation_with_background() {
        let (mut app, _rx) = test_app(None);
        app.show_background();
        app.conversation.submit("What is RAG?");

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = screen_text(&terminal);
        assert_eq!(app.conversation.messages(), &[ChatMessage::user("What is RAG?")]);
        assert!(text.contains("What is RAG?"));
        assert!(text.contains("WAITING"));
        assert!(!text.contains("Welcome to RAG Chat"));
    }

    #[tokio::test]
    async fn test_follow_scrolls_to_bottom() {
        let (mut app, _rx) = test_app(None);
        for i in 0..20 {
            app.conversation.submit(&format!("question {}", i));
            app.conversation.on_transport_success(&serde_json::json!({}));
        }

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(app.max_scroll > 0);
        assert_eq!(app.scroll, app.max_scroll);
        assert!(screen_text(&terminal).contains("question 19"));
    }

    #[tokio::test]
    async fn test_follow_reaches_end_of_word_wrapped_reply() {
        let (mut app, _rx) = test_app(None);
        let reply = "aaaaaaaaaaaa ".repeat(100) + "ZZZZLASTWORD";
        app.conversation.submit("q");
        app.conversation
            .on_transport_success(&serde_json::json!({"outputs":[{"outputs":[{"results":{"message":{"text":reply}}}]}]}));

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(app.follow);
        assert_eq!(app.scroll, app.max_scroll);
        assert!(screen_text(&terminal).contains("ZZZZLASTWORD"));
    }

    #[tokio::test]
    async fn test_reply_markup_is_shown_verbatim() {
        let (mut app, _rx) = test_app(None);
        app.conversation.submit("q");
        app.conversation.on_transport_success(
            &serde_json::json!({"outputs":[{"outputs":[{"results":{"message":{"text":"a **bold** move"}}}]}]}),
        );

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(screen_text(&terminal).contains("a **bold** move"));
    }
}
