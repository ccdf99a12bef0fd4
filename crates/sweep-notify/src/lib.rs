//! Outbound notification channels.
mod config;
pub use config::TelegramConfig;

mod telegram;
pub use telegram::TelegramNotifier;
