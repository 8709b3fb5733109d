//! Typewriter reveal of assistant replies.

use std::borrow::Cow;
use std::time::Duration;

use futures_util::{stream, Stream, StreamExt};

use crate::schedule::{spawn_cancellable, TaskGuard};

/// Per-character delay for assistant replies.
pub const REPLY_CHAR_DELAY: Duration = Duration::from_millis(30);
/// Per-character delay everywhere else.
pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(50);
/// Shown after the visible prefix while a reveal is running.
pub const CURSOR: char = '▌';

/// Byte slice of the first `chars` characters of `text`.
fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Lazily yields every prefix of `text`, from the empty string up to `text`
/// itself, waiting `delay` before each one after the first. Empty input
/// yields nothing.
pub fn prefixes(text: impl Into<String>, delay: Duration) -> impl Stream<Item = String> {
    let text = text.into();
    let total = text.chars().count();

    stream::unfold((text, 0usize), move |(text, shown)| async move {
        if total == 0 || shown > total {
            return None;
        }
        if shown > 0 {
            tokio::time::sleep(delay).await;
        }
        let prefix = char_prefix(&text, shown).to_string();
        Some((prefix, (text, shown + 1)))
    })
}

/// Progress report from a running reveal timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTick {
    pub generation: u64,
    pub shown: usize,
}

#[derive(Debug, Default)]
pub struct TypingReveal {
    target: String,
    total: usize,
    shown: usize,
    generation: u64,
    timer: Option<TaskGuard>,
}

impl TypingReveal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the target and start revealing it from the empty prefix.
    /// Any running reveal is cancelled. `emit` runs on the timer task and
    /// should return `false` once nobody is listening.
    pub fn start<F>(&mut self, target: impl Into<String>, delay: Duration, mut emit: F)
    where
        F: FnMut(RevealTick) -> bool + Send + 'static,
    {
        self.timer = None;
        self.generation += 1;
        self.target = target.into();
        self.total = self.target.chars().count();
        self.shown = 0;

        if self.total == 0 {
            return;
        }

        let generation = self.generation;
        let mut ticks = Box::pin(prefixes(self.target.clone(), delay));
        self.timer = Some(spawn_cancellable(async move {
            while let Some(prefix) = ticks.next().await {
                let shown = prefix.chars().count();
                if !emit(RevealTick { generation, shown }) {
                    break;
                }
            }
        }));
    }

    /// Apply a tick from the timer. Ticks from a replaced reveal, or ones
    /// that would not grow the prefix, are rejected.
    pub fn apply(&mut self, tick: RevealTick) -> bool {
        if tick.generation != self.generation || tick.shown <= self.shown || tick.shown > self.total {
            return false;
        }

        self.shown = tick.shown;
        if self.shown == self.total {
            self.timer = None;
        }
        true
    }

    /// Skip to the full text.
    pub fn finish(&mut self) {
        self.shown = self.total;
        self.timer = None;
    }

    pub fn is_typing(&self) -> bool {
        self.shown < self.total
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn visible(&self) -> &str {
        char_prefix(&self.target, self.shown)
    }

    /// Visible prefix with the cursor while typing, the plain target after.
    pub fn display(&self) -> Cow<'_, str> {
        if self.is_typing() {
            Cow::Owned(format!("{}{}", self.visible(), CURSOR))
        } else {
            Cow::Borrowed(&self.target)
        }
    }
}
