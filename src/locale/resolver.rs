//! Locale resolution strategies
//!
//! Resolution is an explicit ordered list of named strategies, each a pure
//! function from request metadata to an optional locale. The first strategy
//! that yields a value wins; the fixed fallback locale always terminates the
//! chain. Malformed cookies or headers never raise errors, they simply fail
//! to match and the next strategy runs.

use tracing::debug;

use super::{Locale, LocaleConfig};

/// Per-request metadata snapshot consumed by the resolver and route guard
///
/// Captured once per request so every strategy sees the same inputs.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Request path (no query string)
    pub path: String,
    /// Raw Cookie header, if present
    pub cookie_header: Option<String>,
    /// Accept-Language header, if present
    pub accept_language: Option<String>,
    /// Referer header, if present
    pub referer: Option<String>,
    /// Whether the request carried a valid session token
    ///
    /// Token validation is the caller's concern; an expired or malformed
    /// token is indistinguishable from no token at all.
    pub authenticated: bool,
}

type Strategy = fn(&LocaleConfig, &RequestMeta) -> Option<Locale>;

/// Ordered resolution chain: first match wins
const STRATEGIES: &[(&str, Strategy)] = &[
    ("cookie", from_cookie),
    ("accept-language", from_accept_language),
];

/// Resolves the active locale for a request
#[derive(Debug, Clone)]
pub struct LocaleResolver {
    config: LocaleConfig,
}

impl LocaleResolver {
    pub fn new(config: LocaleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocaleConfig {
        &self.config
    }

    /// Resolve the locale for a request
    ///
    /// Runs the strategy chain in order and falls back to the configured
    /// default. This function cannot fail.
    pub fn resolve(&self, meta: &RequestMeta) -> Locale {
        for (name, strategy) in STRATEGIES {
            if let Some(locale) = strategy(&self.config, meta) {
                debug!(strategy = name, locale = %locale, "Locale resolved");
                return locale;
            }
        }
        self.config.fallback()
    }
}

/// Strategy 1: the locale preference cookie
fn from_cookie(config: &LocaleConfig, meta: &RequestMeta) -> Option<Locale> {
    let header = meta.cookie_header.as_deref()?;
    let value = cookie_value(header, config.cookie_name())?;
    config.parse(value)
}

/// Strategy 2: the Accept-Language header
///
/// Candidates are ordered by q-weight before matching, so
/// "fr;q=0.4, es;q=0.9" resolves to Spanish even though French comes first.
fn from_accept_language(config: &LocaleConfig, meta: &RequestMeta) -> Option<Locale> {
    let header = meta.accept_language.as_deref()?;

    let mut candidates: Vec<(&str, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.splitn(2, ';');
            let tag = pieces.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }
            let weight = pieces
                .next()
                .and_then(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            if weight <= 0.0 {
                return None;
            }
            Some((tag, weight))
        })
        .collect();

    // Stable sort keeps header order among equal weights
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    candidates
        .into_iter()
        .find_map(|(tag, _)| config.parse(tag))
}

/// Extract the locale prefix of a referer URL's path, if supported
///
/// Used by the route guard to persist a locale change carried by in-app
/// navigation: a referer of `https://host/es/courses` yields `es`.
pub fn referer_locale(config: &LocaleConfig, referer: &str) -> Option<Locale> {
    let path = referer_path(referer)?;
    config.path_locale(path)
}

/// Extract the path component of a referer URL
///
/// Accepts absolute URLs and bare paths; anything unparsable yields None.
fn referer_path(referer: &str) -> Option<&str> {
    let referer = referer.trim();
    if referer.is_empty() {
        return None;
    }

    if referer.starts_with('/') {
        return Some(referer);
    }

    let after_scheme = referer.split_once("://").map(|(_, rest)| rest)?;
    let slash = after_scheme.find('/')?;
    let path = &after_scheme[slash..];
    // Drop query/fragment
    let end = path.find(['?', '#']).unwrap_or(path.len());
    Some(&path[..end])
}

/// Look up a cookie value by name in a raw Cookie header
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k.trim() == name {
            Some(v.trim())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LocaleResolver {
        LocaleResolver::new(LocaleConfig::new(
            vec!["en".into(), "es".into(), "fr".into(), "pt".into(), "de".into()],
            "en".into(),
            "locale".into(),
        ))
    }

    fn meta() -> RequestMeta {
        RequestMeta {
            path: "/".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cookie_wins_over_header() {
        let r = resolver();
        for code in ["en", "es", "fr", "pt", "de"] {
            let mut m = meta();
            m.cookie_header = Some(format!("locale={}", code));
            m.accept_language = Some("de-DE,de;q=0.9".into());
            assert_eq!(r.resolve(&m).as_str(), code);
        }
    }

    #[test]
    fn test_header_used_without_cookie() {
        let r = resolver();
        let mut m = meta();
        m.accept_language = Some("es-MX,es;q=0.9,en;q=0.5".into());
        assert_eq!(r.resolve(&m).as_str(), "es");
    }

    #[test]
    fn test_header_respects_q_weights() {
        let r = resolver();
        let mut m = meta();
        m.accept_language = Some("fr;q=0.4, es;q=0.9".into());
        assert_eq!(r.resolve(&m).as_str(), "es");
    }

    #[test]
    fn test_header_skips_unsupported_tags() {
        let r = resolver();
        let mut m = meta();
        m.accept_language = Some("sw, pt-BR;q=0.8".into());
        assert_eq!(r.resolve(&m).as_str(), "pt");
    }

    #[test]
    fn test_fallback_when_nothing_resolves() {
        let r = resolver();
        assert_eq!(r.resolve(&meta()).as_str(), "en");

        let mut m = meta();
        m.cookie_header = Some("locale=klingon".into());
        m.accept_language = Some("zz;;;garbage".into());
        assert_eq!(r.resolve(&m).as_str(), "en");
    }

    #[test]
    fn test_unsupported_cookie_falls_through_to_header() {
        let r = resolver();
        let mut m = meta();
        m.cookie_header = Some("locale=sw".into());
        m.accept_language = Some("fr".into());
        assert_eq!(r.resolve(&m).as_str(), "fr");
    }

    #[test]
    fn test_cookie_value_parsing() {
        assert_eq!(cookie_value("a=1; locale=es; b=2", "locale"), Some("es"));
        assert_eq!(cookie_value("locale=es", "locale"), Some("es"));
        assert_eq!(cookie_value("localex=es", "locale"), None);
        assert_eq!(cookie_value("", "locale"), None);
    }

    #[test]
    fn test_referer_locale_extraction() {
        let cfg = resolver().config().clone();
        assert_eq!(
            referer_locale(&cfg, "https://scriptura.app/es/courses/3").unwrap().as_str(),
            "es"
        );
        assert_eq!(
            referer_locale(&cfg, "http://localhost:3000/de?tab=1").unwrap().as_str(),
            "de"
        );
        assert_eq!(referer_locale(&cfg, "/fr/quiz/2").unwrap().as_str(), "fr");
        assert!(referer_locale(&cfg, "https://scriptura.app/courses").is_none());
        assert!(referer_locale(&cfg, "https://scriptura.app").is_none());
        assert!(referer_locale(&cfg, "not a url").is_none());
    }

    #[test]
    fn test_zero_weight_tags_ignored() {
        let r = resolver();
        let mut m = meta();
        m.accept_language = Some("es;q=0, fr;q=0.5".into());
        assert_eq!(r.resolve(&m).as_str(), "fr");
    }
}
