//! Core logic for the Big Boi Blob meme bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the messaging port
//! and timers behind the scheduler port; adapters are implemented elsewhere.

pub mod bot;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod memes;
pub mod messaging;
pub mod scheduler;

pub use errors::{Error, Result};
