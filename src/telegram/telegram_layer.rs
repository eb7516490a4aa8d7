// Telegram layer - adapters between teloxide and the core moderation services.

#[path = "convert.rs"]
pub mod convert;

#[path = "handlers.rs"]
pub mod handlers;

#[path = "platform.rs"]
pub mod platform;

pub use handlers::{schema, AppState};
pub use platform::TelegramPlatform;
