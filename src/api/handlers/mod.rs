//! Route handlers.
//!
//! Handlers read [`AppState`](super::AppState) from a request extension and return
//! [`ApiError`](super::ApiError) on failure so every error body has the same shape.

pub mod admin;
pub mod auth;
pub mod health;
pub mod profile;
pub mod search;
pub mod webfinger;
