//! # ClawGuard Channels
//! Platform-facing implementations of the core traits.
//!
//! - `telegram`: Bot API client for moderation calls, admin lookups and status messages
//! - `console`: status output to stdout for CLI runs
//! - `classify`: maps platform error replies onto action outcomes

pub mod classify;
pub mod console;
pub mod telegram;

pub use console::ConsoleStatus;
pub use telegram::TelegramClient;
