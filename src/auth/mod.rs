//! Session authentication for the Scriptura gateway
//!
//! Provides JWT session-token validation. Credential storage, login, and
//! registration live in the external account service; this gateway only
//! verifies the tokens it issues.

pub mod jwt;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
