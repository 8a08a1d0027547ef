//! Configuration for the Scriptura gateway
//!
//! CLI arguments and environment variable handling using clap.
//! Locale and guard settings are parsed once at startup into immutable
//! config objects handed to the route guard at construction.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Scriptura gateway - locale-aware edge routing and lesson progress
#[derive(Parser, Debug, Clone)]
#[command(name = "scriptura-gateway")]
#[command(about = "HTTP edge gateway for the Scriptura Bible study platform")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// URL of the upstream rendering application
    /// Pass-through page requests are forwarded here after guard evaluation
    #[arg(long, env = "APP_URL", default_value = "http://localhost:3000")]
    pub app_url: String,

    /// Enable development mode (relaxed auth secret, MongoDB optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "scriptura")]
    pub mongodb_db: String,

    /// JWT secret for session token validation (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Comma-separated list of supported locale codes
    /// The first segment of every page path must be one of these
    #[arg(long, env = "SUPPORTED_LOCALES", default_value = "en,es,fr,pt,de")]
    pub supported_locales: String,

    /// Fallback locale when neither cookie nor header resolves
    #[arg(long, env = "DEFAULT_LOCALE", default_value = "en")]
    pub default_locale: String,

    /// Name of the locale preference cookie
    #[arg(long, env = "LOCALE_COOKIE", default_value = "locale")]
    pub locale_cookie: String,

    /// Name of the session token cookie
    #[arg(long, env = "SESSION_COOKIE", default_value = "scriptura_session")]
    pub session_cookie: String,

    /// Comma-separated paths (locale-stripped) requiring authentication
    #[arg(long, env = "PROTECTED_PATHS", default_value = "/dashboard,/account")]
    pub protected_paths: String,

    /// Path (locale-stripped) an authenticated user landing on the root is sent to
    #[arg(long, env = "DASHBOARD_PATH", default_value = "/dashboard")]
    pub dashboard_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Upstream request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret-do-not-deploy-me".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Get the list of supported locale codes
    pub fn supported_locale_list(&self) -> Vec<String> {
        self.supported_locales
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get the list of protected paths
    pub fn protected_path_list(&self) -> Vec<String> {
        self.protected_paths
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        let locales = self.supported_locale_list();
        if locales.is_empty() {
            return Err("SUPPORTED_LOCALES must name at least one locale".to_string());
        }

        if !locales.contains(&self.default_locale.trim().to_ascii_lowercase()) {
            return Err(format!(
                "DEFAULT_LOCALE '{}' is not in SUPPORTED_LOCALES",
                self.default_locale
            ));
        }

        for path in self.protected_path_list() {
            if !path.starts_with('/') {
                return Err(format!("Protected path '{}' must start with '/'", path));
            }
        }

        if !self.dashboard_path.starts_with('/') {
            return Err("DASHBOARD_PATH must start with '/'".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        let mut args = Args::parse_from(["scriptura-gateway"]);
        args.dev_mode = true;
        args
    }

    #[test]
    fn test_supported_locale_list_trims_and_lowercases() {
        let mut args = base_args();
        args.supported_locales = "en, ES ,fr,,".to_string();
        assert_eq!(args.supported_locale_list(), vec!["en", "es", "fr"]);
    }

    #[test]
    fn test_validate_rejects_unsupported_default_locale() {
        let mut args = base_args();
        args.default_locale = "sw".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_protected_path() {
        let mut args = base_args();
        args.protected_paths = "dashboard".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_requires_jwt_secret_in_production() {
        let mut args = base_args();
        args.dev_mode = false;
        args.jwt_secret = None;
        assert!(args.validate().is_err());

        args.jwt_secret = Some("a-secret-that-is-at-least-32-characters".to_string());
        assert!(args.validate().is_ok());
    }
}
