//! HTTP routes for the Scriptura gateway

pub mod health;
pub mod pages;
pub mod progress_routes;

pub use health::{health_check, readiness_check, version_info};
pub use pages::handle_page_request;
pub use progress_routes::handle_progress_request;
