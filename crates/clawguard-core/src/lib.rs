//! # ClawGuard Core
//! Core traits, types, and configuration shared by every ClawGuard crate.
//!
//! The bulk executor talks to the outside world only through the traits in
//! [`traits`]: a presence store, a platform action client, an authorization
//! service and a status sink.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::GuardConfig;
pub use error::{GuardError, Result};
