pub mod config;
pub mod particles;
pub mod reveal;
pub mod schedule;
pub mod session;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use config::{Config, ConfigError, FlowSettings};
pub use particles::{Link, ParticleField, ParticleNode, ParticleSettings, Rgb};
pub use reveal::{RevealTick, TypingReveal, DEFAULT_CHAR_DELAY, REPLY_CHAR_DELAY};
pub use schedule::TaskGuard;
pub use session::{Conversation, Status, TurnRequest};
pub use state::{ChatMessage, ChatRole};
pub use transport::{ChatTransport, FlowClient, Reply, TransportError};
