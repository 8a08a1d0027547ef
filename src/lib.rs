//! Scriptura gateway - locale-aware edge routing and lesson progress
//!
//! The gateway fronts the Scriptura Bible study platform with two concerns:
//!
//! - **Route guard**: every request is intercepted to resolve its locale
//!   (cookie, then Accept-Language, then the configured fallback), normalize
//!   unprefixed paths to `/{locale}{path}`, persist locale changes carried by
//!   in-app navigation, and apply coarse auth gating on protected pages.
//! - **Lesson progress**: per-(user, course) progress records in MongoDB,
//!   updated through atomic field-level upserts and served as a small JSON
//!   API to the lesson UI.
//!
//! Page rendering, content, and billing live in upstream services; the
//! gateway proxies page requests to the rendering app untouched.

pub mod auth;
pub mod config;
pub mod db;
pub mod guard;
pub mod locale;
pub mod progress;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};
