//! Route guard: locale normalization and coarse auth gating
//!
//! Every request passes through here before any other routing. The guard is
//! a pure function of the request snapshot; it holds no mutable state and
//! never fails, so a malformed header can at worst pick a different (but
//! valid) locale.
//!
//! Evaluation order, first match wins:
//! 1. Internal paths (API, health probes, assets) pass through untouched.
//! 2. A path without a supported locale prefix is redirected to
//!    `/{locale}{path}`. This takes priority over everything below.
//! 3. A request carrying a Referer header returns early: if the referer path
//!    has a locale prefix, that locale is persisted into the preference
//!    cookie; either way, auth gating is skipped for this request.
//! 4. Auth gating on the locale-stripped path: an authenticated request for
//!    the root is sent to the dashboard; an unauthenticated request for a
//!    protected path is sent to the root.
//! 5. Everything else passes through unchanged.
//!
//! Step 3's early return means gating effectively applies only to direct
//! navigations (typed URL, bookmark) - in-app navigations always carry a
//! referer. This ordering is deliberate and covered by tests; change it only
//! together with them.

use crate::config::Args;
use crate::locale::{resolver, Locale, LocaleConfig, LocaleResolver, RequestMeta};

/// Path prefixes the guard never touches
const INTERNAL_PREFIXES: &[&str] = &[
    "/api/",
    "/health",
    "/healthz",
    "/ready",
    "/readyz",
    "/version",
    "/static/",
    "/assets/",
    "/favicon.ico",
    "/robots.txt",
];

/// Outcome of guard evaluation for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Respond immediately with a 307 to this location
    Redirect { location: String },
    /// Continue routing; optionally persist a locale into the cookie
    PassThrough { set_locale_cookie: Option<Locale> },
}

impl GuardDecision {
    fn pass() -> Self {
        Self::PassThrough {
            set_locale_cookie: None,
        }
    }
}

/// Per-request interception logic, constructed once at startup
#[derive(Debug, Clone)]
pub struct RouteGuard {
    resolver: LocaleResolver,
    protected_paths: Vec<String>,
    dashboard_path: String,
}

impl RouteGuard {
    pub fn new(
        locales: LocaleConfig,
        protected_paths: Vec<String>,
        dashboard_path: String,
    ) -> Self {
        Self {
            resolver: LocaleResolver::new(locales),
            protected_paths,
            dashboard_path,
        }
    }

    /// Build from validated CLI arguments
    pub fn from_args(args: &Args) -> Self {
        Self::new(
            LocaleConfig::from_args(args),
            args.protected_path_list(),
            args.dashboard_path.clone(),
        )
    }

    pub fn locales(&self) -> &LocaleConfig {
        self.resolver.config()
    }

    /// Evaluate the guard for one request
    pub fn evaluate(&self, meta: &RequestMeta) -> GuardDecision {
        let path = meta.path.as_str();
        let config = self.resolver.config();

        if is_internal_path(path) {
            return GuardDecision::pass();
        }

        // Locale normalization takes priority over all other logic
        if config.path_locale(path).is_none() {
            let locale = self.resolver.resolve(meta);
            return GuardDecision::Redirect {
                location: format!("/{}{}", locale, path),
            };
        }

        // Referer early return: persist the navigation's locale, skip gating
        if let Some(referer) = meta.referer.as_deref() {
            return GuardDecision::PassThrough {
                set_locale_cookie: resolver::referer_locale(config, referer),
            };
        }

        // Auth gating on the locale-stripped path; redirect targets are bare
        // and get re-prefixed by the normalization rule on the next request
        let logical = config.strip_path_locale(path);
        if meta.authenticated && logical == "/" {
            return GuardDecision::Redirect {
                location: self.dashboard_path.clone(),
            };
        }
        if !meta.authenticated && self.protected_paths.iter().any(|p| p == logical) {
            return GuardDecision::Redirect {
                location: "/".to_string(),
            };
        }

        GuardDecision::pass()
    }

    /// Build the Set-Cookie header value persisting a locale preference
    ///
    /// Session-scoped: no Max-Age or Expires.
    pub fn locale_cookie(&self, locale: &Locale) -> String {
        format!(
            "{}={}; Path=/; SameSite=Lax",
            self.resolver.config().cookie_name(),
            locale
        )
    }
}

fn is_internal_path(path: &str) -> bool {
    INTERNAL_PREFIXES.iter().any(|entry| {
        if let Some(prefix) = entry.strip_suffix('/') {
            path == prefix || path.starts_with(entry)
        } else {
            path == *entry
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> RouteGuard {
        RouteGuard::new(
            LocaleConfig::new(
                vec!["en".into(), "es".into(), "fr".into(), "pt".into(), "de".into()],
                "en".into(),
                "locale".into(),
            ),
            vec!["/dashboard".into(), "/account".into()],
            "/dashboard".into(),
        )
    }

    fn meta(path: &str) -> RequestMeta {
        RequestMeta {
            path: path.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unprefixed_path_redirects_to_locale() {
        let g = guard();
        for path in ["/courses", "/courses/5/lesson/2", "/pricing"] {
            match g.evaluate(&meta(path)) {
                GuardDecision::Redirect { location } => {
                    assert_eq!(location, format!("/en{}", path));
                }
                other => panic!("expected redirect for {}, got {:?}", path, other),
            }
        }
    }

    #[test]
    fn test_locale_redirect_uses_resolved_locale() {
        let g = guard();
        let mut m = meta("/courses");
        m.cookie_header = Some("locale=fr".into());
        assert_eq!(
            g.evaluate(&m),
            GuardDecision::Redirect {
                location: "/fr/courses".into()
            }
        );
    }

    #[test]
    fn test_locale_redirect_has_priority_over_auth() {
        // An unprefixed protected path is normalized first, not gated
        let g = guard();
        let m = meta("/dashboard");
        assert_eq!(
            g.evaluate(&m),
            GuardDecision::Redirect {
                location: "/en/dashboard".into()
            }
        );
    }

    #[test]
    fn test_internal_paths_pass_through() {
        let g = guard();
        for path in ["/api/progress", "/health", "/readyz", "/favicon.ico", "/static/app.css"] {
            assert_eq!(g.evaluate(&meta(path)), GuardDecision::pass());
        }
    }

    #[test]
    fn test_referer_persists_locale_cookie() {
        let g = guard();
        let mut m = meta("/es/courses");
        m.referer = Some("https://scriptura.app/es/".into());
        match g.evaluate(&m) {
            GuardDecision::PassThrough { set_locale_cookie } => {
                assert_eq!(set_locale_cookie.unwrap().as_str(), "es");
            }
            other => panic!("expected pass-through, got {:?}", other),
        }
    }

    #[test]
    fn test_referer_skips_auth_gating() {
        // Protected path, unauthenticated, but a referer is present:
        // the early return wins and no redirect happens
        let g = guard();
        let mut m = meta("/en/dashboard");
        m.referer = Some("https://scriptura.app/en/courses".into());
        match g.evaluate(&m) {
            GuardDecision::PassThrough { set_locale_cookie } => {
                assert_eq!(set_locale_cookie.unwrap().as_str(), "en");
            }
            other => panic!("expected pass-through, got {:?}", other),
        }
    }

    #[test]
    fn test_referer_without_locale_still_returns_early() {
        let g = guard();
        let mut m = meta("/en/dashboard");
        m.referer = Some("https://www.example.com/some/page".into());
        assert_eq!(g.evaluate(&m), GuardDecision::pass());
    }

    #[test]
    fn test_unauthenticated_protected_path_redirects_to_root() {
        let g = guard();
        for path in ["/en/dashboard", "/fr/account"] {
            assert_eq!(
                g.evaluate(&meta(path)),
                GuardDecision::Redirect {
                    location: "/".into()
                }
            );
        }
    }

    #[test]
    fn test_authenticated_root_redirects_to_dashboard() {
        let g = guard();
        let mut m = meta("/en");
        m.authenticated = true;
        assert_eq!(
            g.evaluate(&m),
            GuardDecision::Redirect {
                location: "/dashboard".into()
            }
        );
    }

    #[test]
    fn test_authenticated_protected_path_passes() {
        let g = guard();
        let mut m = meta("/en/dashboard");
        m.authenticated = true;
        assert_eq!(g.evaluate(&m), GuardDecision::pass());
    }

    #[test]
    fn test_unauthenticated_public_page_passes() {
        let g = guard();
        assert_eq!(g.evaluate(&meta("/es/courses/3")), GuardDecision::pass());
    }

    #[test]
    fn test_locale_cookie_format() {
        let g = guard();
        let locale = g.locales().parse("es").unwrap();
        assert_eq!(g.locale_cookie(&locale), "locale=es; Path=/; SameSite=Lax");
    }
}
