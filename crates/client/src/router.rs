//! Request classification.
//!
//! An ordered list of (matcher, target) pairs evaluated top-down; the first
//! match wins and an unconditional fallback route always answers.
//! Classification is a pure function of method, destination, mode and URL.

use std::collections::BTreeSet;

use orc_core::{AppConfig, Destination, Error, ExpirationPolicy, Request, RuntimeRule, StrategyKind};
use regex::Regex;
use url::Url;

const THIRTY_DAYS: u64 = 30 * 24 * 60 * 60;
const ONE_YEAR: u64 = 365 * 24 * 60 * 60;

/// What to hand back when both network and store come up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Propagate the network error.
    None,
    /// Serve the installed offline document.
    OfflineDocument,
    /// Synthesize `{"error":"offline"}` as JSON.
    OfflineJson,
}

/// Which response statuses may be written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cacheable {
    /// Any 2xx.
    #[default]
    Success,
    /// Exactly these statuses (0 stands for an opaque cross-origin answer).
    Statuses(Vec<u16>),
}

impl Cacheable {
    pub fn allows(&self, status: u16) -> bool {
        match self {
            Cacheable::Success => (200..300).contains(&status),
            Cacheable::Statuses(list) => list.contains(&status),
        }
    }
}

/// How a matched request is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub strategy: StrategyKind,
    pub store: String,
    pub expiration: ExpirationPolicy,
    pub cacheable: Cacheable,
    pub fallback: Fallback,
}

impl RouteTarget {
    pub fn new(strategy: StrategyKind, store: impl Into<String>) -> Self {
        Self {
            strategy,
            store: store.into(),
            expiration: ExpirationPolicy::none(),
            cacheable: Cacheable::Success,
            fallback: Fallback::None,
        }
    }

    pub fn network_only() -> Self {
        Self::new(StrategyKind::NetworkOnly, "")
    }

    pub fn with_expiration(mut self, expiration: ExpirationPolicy) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_cacheable(mut self, cacheable: Cacheable) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Whether the target reads or writes a store at all.
    pub fn uses_store(&self) -> bool {
        self.strategy != StrategyKind::NetworkOnly && !self.store.is_empty()
    }
}

/// Request predicate.
#[derive(Debug, Clone)]
pub enum Matcher {
    NonGet,
    UrlPattern(Regex),
    Destination(Destination),
    /// Serialized origin, e.g. `https://fonts.gstatic.com`.
    Origin(String),
    Navigation,
    /// Exact, fragment-free URLs.
    Urls(BTreeSet<String>),
    /// Path segment prefix: `/api` matches `/api` and `/api/...` but not `/apiary`.
    PathPrefix(String),
    Any,
}

impl Matcher {
    pub fn origin(origin: &str) -> Self {
        let normalized = Url::parse(origin)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|_| origin.trim_end_matches('/').to_string());
        Matcher::Origin(normalized)
    }

    pub fn path_prefix(prefix: &str) -> Self {
        Matcher::PathPrefix(prefix.trim_end_matches('/').to_string())
    }

    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Matcher::NonGet => !request.is_get(),
            Matcher::UrlPattern(re) => re.is_match(request.url.as_str()),
            Matcher::Destination(d) => request.destination == *d,
            Matcher::Origin(origin) => request.origin() == *origin,
            Matcher::Navigation => request.is_navigation(),
            Matcher::Urls(urls) => urls.contains(request.url.as_str()),
            Matcher::PathPrefix(prefix) => {
                let path = request.url.path();
                path == prefix || (path.starts_with(prefix.as_str()) && path[prefix.len()..].starts_with('/'))
            }
            Matcher::Any => true,
        }
    }
}

/// A named (matcher, target) pair.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub matcher: Matcher,
    pub target: RouteTarget,
}

impl Route {
    pub fn new(name: impl Into<String>, matcher: Matcher, target: RouteTarget) -> Self {
        Self { name: name.into(), matcher, target }
    }
}

/// Ordered classification table.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
    fallback: Route,
}

impl Router {
    pub fn new(routes: Vec<Route>, fallback: RouteTarget) -> Self {
        Self { routes, fallback: Route::new("default", Matcher::Any, fallback) }
    }

    /// The canonical table. Precached URLs are answered from the main
    /// store first, then configured runtime rules, then the built-in
    /// image / font / navigation / API routes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if a runtime rule pattern does not
    /// compile or the precache manifest cannot be loaded or resolved.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let stores = &config.stores;
        let mut routes = vec![Route::new("non-get", Matcher::NonGet, RouteTarget::network_only())];

        let precached = config
            .precache_manifest()?
            .iter()
            .map(|entry| config.resolve(&entry.url).map(|url| url.to_string()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        if !precached.is_empty() {
            routes.push(Route::new(
                "precache",
                Matcher::Urls(precached),
                RouteTarget::new(StrategyKind::CacheFirst, config.main_store()).with_fallback(Fallback::OfflineDocument),
            ));
        }

        for rule in &config.runtime_rules {
            routes.push(runtime_route(rule)?);
        }

        routes.push(Route::new(
            "images",
            Matcher::Destination(Destination::Image),
            RouteTarget::new(StrategyKind::CacheFirst, &stores.images)
                .with_expiration(ExpirationPolicy::max_entries(60).with_max_age(THIRTY_DAYS)),
        ));
        routes.push(Route::new(
            "font-stylesheets",
            Matcher::origin(&config.font_stylesheet_origin),
            RouteTarget::new(StrategyKind::StaleWhileRevalidate, &stores.font_stylesheets),
        ));
        routes.push(Route::new(
            "font-files",
            Matcher::origin(&config.font_file_origin),
            RouteTarget::new(StrategyKind::CacheFirst, &stores.font_files)
                .with_expiration(ExpirationPolicy::max_age(ONE_YEAR))
                .with_cacheable(Cacheable::Statuses(vec![0, 200])),
        ));
        routes.push(Route::new(
            "navigation",
            Matcher::Navigation,
            RouteTarget::new(StrategyKind::NetworkFirst, &stores.pages)
                .with_expiration(ExpirationPolicy::max_entries(25))
                .with_fallback(Fallback::OfflineDocument),
        ));
        routes.push(Route::new(
            "api",
            Matcher::path_prefix(&config.api_prefix),
            RouteTarget::new(StrategyKind::CacheFirst, &stores.api).with_fallback(Fallback::OfflineJson),
        ));

        let fallback =
            RouteTarget::new(StrategyKind::NetworkFirst, config.main_store()).with_fallback(Fallback::OfflineDocument);

        Ok(Self::new(routes, fallback))
    }

    /// First route whose matcher accepts the request.
    pub fn classify(&self, request: &Request) -> &Route {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(request))
            .unwrap_or(&self.fallback)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().chain(std::iter::once(&self.fallback))
    }

    /// Every store some route reads or writes.
    pub fn store_names(&self) -> BTreeSet<String> {
        self.routes()
            .filter(|r| r.target.uses_store())
            .map(|r| r.target.store.clone())
            .collect()
    }
}

fn runtime_route(rule: &RuntimeRule) -> Result<Route, Error> {
    let pattern = Regex::new(&rule.url_pattern)
        .map_err(|e| Error::InvalidInput(format!("runtime rule pattern {}: {e}", rule.url_pattern)))?;

    let cacheable = match &rule.cacheable_statuses {
        Some(statuses) => Cacheable::Statuses(statuses.clone()),
        None => Cacheable::Success,
    };

    let target = RouteTarget::new(rule.handler, &rule.cache_name)
        .with_expiration(rule.expiration)
        .with_cacheable(cacheable);

    Ok(Route::new(format!("rule:{}", rule.cache_name), Matcher::UrlPattern(pattern), target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_core::RequestMode;

    fn router() -> Router {
        Router::from_config(&AppConfig::default()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn route_name(router: &Router, request: &Request) -> String {
        router.classify(request).name.clone()
    }

    #[test]
    fn test_image_route() {
        let r = router();
        let req = Request::get(url("http://localhost:5173/img/car.png"));
        let route = r.classify(&req);
        assert_eq!(route.name, "images");
        assert_eq!(route.target.strategy, StrategyKind::CacheFirst);
        assert_eq!(route.target.store, "images");
        assert_eq!(route.target.expiration.max_entries, Some(60));
        assert_eq!(route.target.expiration.max_age_seconds, Some(2_592_000));
    }

    #[test]
    fn test_precached_urls_use_main_store() {
        let r = router();
        let home = r.classify(&Request::navigate(url("http://localhost:5173/")));
        assert_eq!(home.name, "precache");
        assert_eq!(home.target.strategy, StrategyKind::CacheFirst);
        assert_eq!(home.target.store, "avtoservis-cache-v1");
        assert_eq!(home.target.fallback, Fallback::OfflineDocument);

        let icon = Request::get(url("http://localhost:5173/pwa-192x192.png")).with_destination(Destination::Image);
        assert_eq!(route_name(&r, &icon), "precache");

        assert_eq!(route_name(&r, &Request::navigate(url("http://localhost:5173/index.html?v=2"))), "navigation");
        assert_eq!(route_name(&r, &Request::get(url("http://other.test/index.html"))), "default");
    }

    #[test]
    fn test_empty_manifest_has_no_precache_route() {
        let config = AppConfig { precache: Vec::new(), ..Default::default() };
        let r = Router::from_config(&config).unwrap();
        assert!(r.routes().all(|route| route.name != "precache"));
        assert_eq!(route_name(&r, &Request::navigate(url("http://localhost:5173/"))), "navigation");
    }

    #[test]
    fn test_image_wins_over_api_prefix() {
        let r = router();
        let req = Request::get(url("http://localhost:5173/api/uploads/photo.jpg"));
        assert_eq!(route_name(&r, &req), "images");
    }

    #[test]
    fn test_font_routes() {
        let r = router();
        let css = Request::get(url("https://fonts.googleapis.com/css2?family=Roboto"));
        let route = r.classify(&css);
        assert_eq!(route.name, "font-stylesheets");
        assert_eq!(route.target.strategy, StrategyKind::StaleWhileRevalidate);
        assert!(route.target.expiration.is_unbounded());

        let font = Request::get(url("https://fonts.gstatic.com/s/roboto/v30/a.woff2"));
        let route = r.classify(&font);
        assert_eq!(route.name, "font-files");
        assert_eq!(route.target.expiration.max_age_seconds, Some(31_536_000));
        assert!(route.target.cacheable.allows(0));
        assert!(route.target.cacheable.allows(200));
        assert!(!route.target.cacheable.allows(204));
    }

    #[test]
    fn test_navigation_route() {
        let r = router();
        let route = r.classify(&Request::navigate(url("http://localhost:5173/appointments")));
        assert_eq!(route.name, "navigation");
        assert_eq!(route.target.strategy, StrategyKind::NetworkFirst);
        assert_eq!(route.target.store, "pages");
        assert_eq!(route.target.expiration.max_entries, Some(25));
        assert_eq!(route.target.fallback, Fallback::OfflineDocument);
    }

    #[test]
    fn test_api_route_segment_match() {
        let r = router();
        assert_eq!(route_name(&r, &Request::get(url("http://localhost:5173/api"))), "api");
        assert_eq!(route_name(&r, &Request::get(url("http://localhost:5173/api/vehicles?id=4"))), "api");
        assert_eq!(route_name(&r, &Request::get(url("http://localhost:5173/apiary"))), "default");

        let route = r.classify(&Request::get(url("http://localhost:5173/api/services")));
        assert_eq!(route.target.store, "api-cache");
        assert_eq!(route.target.fallback, Fallback::OfflineJson);
    }

    #[test]
    fn test_default_route() {
        let r = router();
        let route = r.classify(&Request::get(url("http://localhost:5173/assets/index.js")));
        assert_eq!(route.name, "default");
        assert_eq!(route.target.strategy, StrategyKind::NetworkFirst);
        assert_eq!(route.target.store, "avtoservis-cache-v1");
        assert_eq!(route.target.fallback, Fallback::OfflineDocument);
    }

    #[test]
    fn test_non_get_is_network_only() {
        let r = router();
        let mut req = Request::get(url("http://localhost:5173/api/appointments"));
        req.method = "POST".into();
        let route = r.classify(&req);
        assert_eq!(route.name, "non-get");
        assert!(!route.target.uses_store());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let r = router();
        let requests = [
            Request::get(url("http://localhost:5173/logo.svg")),
            Request::navigate(url("http://localhost:5173/")),
            Request::get(url("http://localhost:5173/api/masters")),
            Request::get(url("https://fonts.googleapis.com/css")),
            Request::get(url("http://localhost:5173/manifest.json")),
        ];
        for req in &requests {
            let first = route_name(&r, req);
            for _ in 0..50 {
                assert_eq!(route_name(&r, req), first);
            }
        }
    }

    #[test]
    fn test_runtime_rule_precedes_builtins() {
        let config = AppConfig {
            runtime_rules: vec![RuntimeRule {
                url_pattern: r"^https://api\.avtoservis\.com/api".into(),
                handler: StrategyKind::NetworkFirst,
                cache_name: "remote-api".into(),
                expiration: ExpirationPolicy::max_entries(100).with_max_age(86_400),
                cacheable_statuses: Some(vec![0, 200]),
            }],
            ..Default::default()
        };
        let r = Router::from_config(&config).unwrap();

        let route = r.classify(&Request::get(url("https://api.avtoservis.com/api/vehicles")));
        assert_eq!(route.name, "rule:remote-api");
        assert_eq!(route.target.strategy, StrategyKind::NetworkFirst);
        assert_eq!(route.target.expiration.max_entries, Some(100));
        assert!(r.store_names().contains("remote-api"));
    }

    #[test]
    fn test_runtime_rule_bad_pattern() {
        let config = AppConfig {
            runtime_rules: vec![RuntimeRule {
                url_pattern: "(".into(),
                handler: StrategyKind::CacheFirst,
                cache_name: "x".into(),
                expiration: ExpirationPolicy::none(),
                cacheable_statuses: None,
            }],
            ..Default::default()
        };
        assert!(matches!(Router::from_config(&config), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_store_names() {
        let names = router().store_names();
        let expected: BTreeSet<String> = [
            "api-cache",
            "avtoservis-cache-v1",
            "google-fonts-stylesheets",
            "google-fonts-webfonts",
            "images",
            "pages",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_matcher_origin_normalizes() {
        let m = Matcher::origin("https://fonts.googleapis.com/");
        assert!(m.matches(&Request::get(url("https://fonts.googleapis.com/css2"))));
        assert!(!m.matches(&Request::get(url("http://fonts.googleapis.com/css2"))));
    }

    #[test]
    fn test_navigation_mode_needed() {
        let r = router();
        let mut req = Request::get(url("http://localhost:5173/offline.html"));
        req.mode = RequestMode::SameOrigin;
        assert_eq!(route_name(&r, &req), "default");
    }
}
