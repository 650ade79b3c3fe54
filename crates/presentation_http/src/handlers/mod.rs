//! HTTP request handlers

pub mod events;
pub mod health;
pub mod refresh_free;
pub mod summarize;
