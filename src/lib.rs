//! # Recipe Pages Telegram Bot
//!
//! Walks a user through a short sequence of prompts (a recipe, or a movie
//! title plus download links), renders the answers into a static HTML page
//! and sends it back as a document.

pub mod bot;
pub mod circuit_breaker;
pub mod config;
pub mod delivery;
pub mod dialogue;
pub mod flows;
pub mod localization;
pub mod metadata;
pub mod render;
pub mod validation;
