use std::sync::Arc;
use std::time::Duration;

use rag_chat_core::schedule::every;
use rag_chat_core::{
    ChatRole, ChatTransport, Conversation, ParticleField, ParticleSettings, RevealTick,
    TaskGuard, TransportError, TypingReveal, DEFAULT_CHAR_DELAY,
};
use ratatui::layout::Rect;
use serde_json::Value;

use crate::tui::{AppEvent, EventSender, RevealSlot};

pub const WELCOME_TAGLINE: &str = "Your AI-powered course assistant is ready";

/// Viewport units per terminal cell, so link distances read like pixels.
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub reply_delay: Duration,
    pub particles: ParticleSettings,
    pub background: bool,
}

/// Running particle animation. Dropping it stops the frame loop.
pub struct Background {
    pub field: ParticleField,
    _frames: TaskGuard,
}

pub struct App {
    pub should_quit: bool,

    // Conversation
    pub conversation: Conversation,
    transport: Arc<dyn ChatTransport>,
    events: EventSender,

    // Input line
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Reveal state: the reply reveal always tracks the newest assistant message
    pub reply_reveal: TypingReveal,
    pub revealed_index: Option<usize>,
    pub welcome_reveal: TypingReveal,
    reply_delay: Duration,

    // Background
    pub background: Option<Background>,
    particle_settings: ParticleSettings,
    pub viewport: (u16, u16),

    // Chat scrolling (updated during render)
    pub scroll: u16,
    pub max_scroll: u16,
    pub follow: bool,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for loading dots
}

impl App {
    pub fn new(
        options: AppOptions,
        transport: Arc<dyn ChatTransport>,
        events: EventSender,
        viewport: (u16, u16),
    ) -> Self {
        let mut app = Self {
            should_quit: false,
            conversation: Conversation::new(),
            transport,
            events,
            input: String::new(),
            cursor: 0,
            reply_reveal: TypingReveal::new(),
            revealed_index: None,
            welcome_reveal: TypingReveal::new(),
            reply_delay: options.reply_delay,
            background: None,
            particle_settings: options.particles,
            viewport,
            scroll: 0,
            max_scroll: 0,
            follow: true,
            chat_area: None,
            animation_frame: 0,
        };

        let emit = app.reveal_emitter(RevealSlot::Welcome);
        app.welcome_reveal.start(WELCOME_TAGLINE, DEFAULT_CHAR_DELAY, emit);

        if options.background {
            app.show_background();
        }

        tracing::info!(session = %app.conversation.id(), "chat session started");
        app
    }

    fn reveal_emitter(&self, slot: RevealSlot) -> impl FnMut(RevealTick) -> bool + Send + 'static {
        let tx = self.events.clone();
        move |tick| tx.send(AppEvent::Reveal { slot, tick }).is_ok()
    }

    // Conversation

    /// Submit the input line. The line is only cleared if the conversation
    /// accepted it.
    pub fn submit_input(&mut self) {
        let Some(request) = self.conversation.submit(&self.input) else {
            return;
        };

        self.input.clear();
        self.cursor = 0;
        self.follow = true;

        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = transport.run(&request).await;
            let _ = events.send(AppEvent::Reply(outcome));
        });
    }

    pub fn on_reply(&mut self, outcome: Result<Value, TransportError>) {
        if !self.conversation.complete(outcome) {
            return;
        }

        let messages = self.conversation.messages();
        let index = messages.len() - 1;
        let reply = &messages[index];
        if reply.role == ChatRole::Assistant {
            let content = reply.content.clone();
            let emit = self.reveal_emitter(RevealSlot::Reply);
            self.reply_reveal.start(content, self.reply_delay, emit);
            self.revealed_index = Some(index);
        }
        self.follow = true;
    }

    pub fn on_reveal(&mut self, slot: RevealSlot, tick: RevealTick) {
        match slot {
            RevealSlot::Welcome => self.welcome_reveal.apply(tick),
            RevealSlot::Reply => self.reply_reveal.apply(tick),
        };
    }

    /// Skip a running reply reveal. Returns `false` if nothing was typing.
    pub fn finish_reveal(&mut self) -> bool {
        if self.reply_reveal.is_typing() {
            self.reply_reveal.finish();
            true
        } else {
            false
        }
    }

    /// Text to show for message `index`: only the newest reply is revealed
    /// progressively.
    pub fn message_text(&self, index: usize) -> std::borrow::Cow<'_, str> {
        if self.revealed_index == Some(index) {
            self.reply_reveal.display()
        } else {
            std::borrow::Cow::Borrowed(self.conversation.messages()[index].content.as_str())
        }
    }

    // Background

    pub fn show_background(&mut self) {
        if self.background.is_some() {
            return;
        }

        let (width, height) = viewport_units(self.viewport);
        let field = ParticleField::new(width, height, self.particle_settings, &mut rand::thread_rng());
        let tx = self.events.clone();
        let frames = every(FRAME_INTERVAL, move || tx.send(AppEvent::Frame).is_ok());
        self.background = Some(Background {
            field,
            _frames: frames,
        });
    }

    pub fn hide_background(&mut self) {
        self.background = None;
    }

    pub fn toggle_background(&mut self) {
        if self.background.is_some() {
            self.hide_background();
        } else {
            self.show_background();
        }
    }

    pub fn on_frame(&mut self) {
        if let Some(background) = &mut self.background {
            background.field.step();
        }
    }

    pub fn on_resize(&mut self, width: u16, height: u16) {
        self.viewport = (width, height);
        if let Some(background) = &mut self.background {
            let (w, h) = viewport_units(self.viewport);
            background.field.resize(w, h);
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.is_awaiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.min(self.max_scroll).saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll);
        if self.scroll >= self.max_scroll {
            self.follow = true;
        }
    }

    pub fn page_height(&self) -> u16 {
        self.chat_area
            .map(|area| area.height.saturating_sub(2))
            .unwrap_or(10)
            .max(2)
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn viewport_units((width, height): (u16, u16)) -> (f64, f64) {
    (width as f64 * CELL_WIDTH, height as f64 * CELL_HEIGHT)
}
