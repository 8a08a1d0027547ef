//! Locale handling for the Scriptura gateway
//!
//! A `Locale` is always a member of the configured supported set; the only
//! way to obtain one is through `LocaleConfig`, so downstream code never
//! sees an unvalidated code. Resolution order (cookie, then header, then
//! fallback) lives in `resolver`.

pub mod resolver;

pub use resolver::{LocaleResolver, RequestMeta};

use crate::config::Args;

/// A validated locale code, guaranteed to be in the supported set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable locale configuration, built once at startup
#[derive(Debug, Clone)]
pub struct LocaleConfig {
    supported: Vec<String>,
    fallback: String,
    cookie_name: String,
}

impl LocaleConfig {
    pub fn new(supported: Vec<String>, fallback: String, cookie_name: String) -> Self {
        Self {
            supported,
            fallback,
            cookie_name,
        }
    }

    /// Build from validated CLI arguments
    pub fn from_args(args: &Args) -> Self {
        Self::new(
            args.supported_locale_list(),
            args.default_locale.trim().to_ascii_lowercase(),
            args.locale_cookie.clone(),
        )
    }

    /// Parse a candidate code into a supported locale
    ///
    /// Matches the full tag first, then the primary subtag ("pt-BR" matches
    /// "pt"). Unsupported or malformed input yields None, never an error.
    pub fn parse(&self, candidate: &str) -> Option<Locale> {
        let code = candidate.trim().to_ascii_lowercase();
        if code.is_empty() {
            return None;
        }

        if self.supported.iter().any(|s| *s == code) {
            return Some(Locale(code));
        }

        let primary = code.split(['-', '_']).next().unwrap_or("");
        if !primary.is_empty() && self.supported.iter().any(|s| *s == primary) {
            return Some(Locale(primary.to_string()));
        }

        None
    }

    /// The fixed fallback locale
    pub fn fallback(&self) -> Locale {
        Locale(self.fallback.clone())
    }

    /// Name of the locale preference cookie
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Extract the leading locale segment of a path, if supported
    ///
    /// `/en/courses/5` yields `en`; `/courses/5` yields None. Only exact
    /// members of the supported set count as path prefixes.
    pub fn path_locale(&self, path: &str) -> Option<Locale> {
        let first = path.strip_prefix('/')?.split('/').next()?;
        let code = first.to_ascii_lowercase();
        if self.supported.iter().any(|s| *s == code) {
            Some(Locale(code))
        } else {
            None
        }
    }

    /// Strip a supported locale prefix from a path, yielding the logical path
    ///
    /// `/en/dashboard` becomes `/dashboard`; `/en` becomes `/`. Paths with
    /// no locale prefix are returned unchanged.
    pub fn strip_path_locale<'a>(&self, path: &'a str) -> &'a str {
        if let Some(locale) = self.path_locale(path) {
            let rest = &path[1 + locale.as_str().len()..];
            if rest.is_empty() {
                "/"
            } else {
                rest
            }
        } else {
            path
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LocaleConfig {
        LocaleConfig::new(
            vec!["en".into(), "es".into(), "fr".into(), "pt".into(), "de".into()],
            "en".into(),
            "locale".into(),
        )
    }

    #[test]
    fn test_parse_exact_match() {
        let cfg = config();
        assert_eq!(cfg.parse("es").unwrap().as_str(), "es");
        assert_eq!(cfg.parse(" FR ").unwrap().as_str(), "fr");
    }

    #[test]
    fn test_parse_primary_subtag() {
        let cfg = config();
        assert_eq!(cfg.parse("pt-BR").unwrap().as_str(), "pt");
        assert_eq!(cfg.parse("de_AT").unwrap().as_str(), "de");
    }

    #[test]
    fn test_parse_unsupported_yields_none() {
        let cfg = config();
        assert!(cfg.parse("sw").is_none());
        assert!(cfg.parse("").is_none());
        assert!(cfg.parse("not a locale").is_none());
    }

    #[test]
    fn test_path_locale() {
        let cfg = config();
        assert_eq!(cfg.path_locale("/en/courses/5").unwrap().as_str(), "en");
        assert_eq!(cfg.path_locale("/pt").unwrap().as_str(), "pt");
        assert!(cfg.path_locale("/courses/5").is_none());
        assert!(cfg.path_locale("/").is_none());
        // Only exact members count as prefixes; regioned tags do not appear in paths
        assert!(cfg.path_locale("/pt-BR/courses").is_none());
    }

    #[test]
    fn test_strip_path_locale() {
        let cfg = config();
        assert_eq!(cfg.strip_path_locale("/en/dashboard"), "/dashboard");
        assert_eq!(cfg.strip_path_locale("/en"), "/");
        assert_eq!(cfg.strip_path_locale("/dashboard"), "/dashboard");
        assert_eq!(cfg.strip_path_locale("/"), "/");
    }
}
