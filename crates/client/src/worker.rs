//! The offline cache as a whole: routing table, strategies, lifecycle
//! state and event dispatch.

use std::collections::BTreeSet;
use std::sync::Arc;

use orc_core::cache::state::{ACTIVE_VERSION, INSTALLED_VERSION};
use orc_core::{AppConfig, CacheDb, Error, Request, ResponseSource};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::fetch::Transport;
use crate::lifecycle::{ActivateReport, InstallReport};
use crate::push::{Notification, Notifier, PushPayload};
use crate::router::Router;
use crate::strategy::{self, Handled, OfflineDocument, StrategyContext};

/// Installed and active versions as last recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct WorkerState {
    pub installed: Option<String>,
    pub active: Option<String>,
}

/// Control messages posted by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate an installed-but-waiting version now.
    SkipWaiting,
}

/// Everything the cache reacts to.
#[derive(Debug)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Push(PushPayload),
    Message(WorkerMessage),
    Online,
}

/// Result of handling an `Event`.
#[derive(Debug)]
pub enum Outcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetched(Handled),
    Notified(Notification),
    /// The message activated a waiting version, or had nothing to do.
    Message(Option<ActivateReport>),
    Online,
}

/// An offline-capable request cache for one deployed version.
pub struct OfflineCache {
    pub(crate) config: AppConfig,
    pub(crate) router: Router,
    pub(crate) ctx: StrategyContext,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) state: RwLock<WorkerState>,
}

impl OfflineCache {
    /// Build the cache and load the recorded lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the routing table or offline URL
    /// cannot be built from `config`, or a database error if the state
    /// table cannot be read.
    pub async fn new(
        config: AppConfig, db: CacheDb, transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>,
    ) -> Result<Self, Error> {
        let router = Router::from_config(&config)?;
        let offline = OfflineDocument {
            store: config.stores.offline.clone(),
            request: Request::navigate(config.offline_document_url()?),
        };

        let state = WorkerState {
            installed: db.get_state(INSTALLED_VERSION).await?,
            active: db.get_state(ACTIVE_VERSION).await?,
        };
        tracing::debug!(installed = ?state.installed, active = ?state.active, "loaded worker state");

        Ok(Self {
            config,
            router,
            ctx: StrategyContext { db, transport, offline },
            notifier,
            state: RwLock::new(state),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.ctx.db
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn version(&self) -> &str {
        &self.config.cache_version
    }

    pub async fn state(&self) -> WorkerState {
        self.state.read().await.clone()
    }

    /// Whether the configured version has been activated.
    pub async fn is_current(&self) -> bool {
        self.state.read().await.active.as_deref() == Some(self.version())
    }

    /// Stores that survive activation: the main store, the offline store
    /// and every store the routing table uses.
    pub fn allow_list(&self) -> BTreeSet<String> {
        let mut allow = self.router.store_names();
        allow.insert(self.config.main_store());
        allow.insert(self.config.stores.offline.clone());
        allow
    }

    /// Install and activate the configured version unless it is already
    /// active. Returns the install report when work was done.
    pub async fn start(&self) -> Result<Option<InstallReport>, Error> {
        if self.is_current().await {
            tracing::info!(version = %self.version(), "version already active");
            return Ok(None);
        }
        self.install().await.map(Some)
    }

    /// Intercept one request.
    ///
    /// Until the configured version is active, including while it is
    /// installed and waiting, the request goes straight to the network and
    /// nothing is stored.
    pub async fn fetch(&self, mut request: Request) -> Result<Handled, Error> {
        request.url.set_fragment(None);

        if !self.is_current().await {
            tracing::debug!(url = %request.url, version = %self.version(), "version not active, passing through");
            let response = self.ctx.transport.fetch(&request).await?;
            return Ok(Handled::new(response.with_source(ResponseSource::Network)));
        }

        let route = self.router.classify(&request);
        tracing::debug!(
            url = %request.url,
            method = %request.method,
            route = %route.name,
            store = %route.target.store,
            "classified request"
        );
        strategy::run(&self.ctx, &route.target, &request).await
    }

    /// Show a notification for a push message. Delivery failures are logged.
    pub async fn push(&self, payload: PushPayload) -> Notification {
        let notification = Notification::from_payload(payload, &self.config.notification_icon);
        if let Err(e) = self.notifier.show(notification.clone()).await {
            tracing::warn!(title = %notification.title, error = %e, "notification delivery failed");
        }
        notification
    }

    pub async fn message(&self, message: WorkerMessage) -> Result<Option<ActivateReport>, Error> {
        match message {
            WorkerMessage::SkipWaiting => {
                let waiting = {
                    let state = self.state.read().await;
                    state.installed.as_deref() == Some(self.version()) && state.active.as_deref() != Some(self.version())
                };
                if !waiting {
                    tracing::debug!(version = %self.version(), "skip waiting: nothing waiting");
                    return Ok(None);
                }
                self.activate().await.map(Some)
            }
        }
    }

    pub fn online(&self) {
        tracing::info!("network restored");
    }

    pub async fn handle(&self, event: Event) -> Result<Outcome, Error> {
        match event {
            Event::Install => self.install().await.map(Outcome::Installed),
            Event::Activate => self.activate().await.map(Outcome::Activated),
            Event::Fetch(request) => self.fetch(request).await.map(Outcome::Fetched),
            Event::Push(payload) => Ok(Outcome::Notified(self.push(payload).await)),
            Event::Message(message) => self.message(message).await.map(Outcome::Message),
            Event::Online => {
                self.online();
                Ok(Outcome::Online)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{OFFLINE_URL, RecordingNotifier, ScriptedTransport, offline_cache, offline_cache_on, test_config};
    use url::Url;

    fn nav(path: &str) -> Request {
        Request::navigate(Url::parse(&format!("http://app.test{path}")).unwrap())
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let transport = ScriptedTransport::new();
        transport.respond("http://app.test/img/car.png", 200, "png");
        let cache = offline_cache(transport.clone(), test_config()).await;

        let req = Request::get(Url::parse("http://app.test/img/car.png").unwrap());
        let handled = cache.fetch(req.clone()).await.unwrap();
        assert_eq!(handled.response.text(), "png");
        assert!(cache.db().list_store_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_waiting_version_does_not_route() {
        let transport = ScriptedTransport::new();
        transport.respond("http://app.test/api/vehicles", 200, "[]");
        transport.respond("http://app.test/garage", 200, "garage");
        let db = CacheDb::open_in_memory().await.unwrap();
        offline_cache_on(db.clone(), transport.clone(), test_config()).await.activate().await.unwrap();

        let v2 = AppConfig { cache_version: "v2".into(), skip_waiting: false, ..test_config() };
        let cache = offline_cache_on(db, transport.clone(), v2).await;
        let report = cache.install().await.unwrap();
        assert!(report.activation.is_none());
        assert_eq!(cache.state().await.active.as_deref(), Some("v1"));
        let main_before = cache.db().store("avtoservis-cache-v2").len().await.unwrap();

        let api = Request::get(Url::parse("http://app.test/api/vehicles").unwrap());
        let handled = cache.fetch(api).await.unwrap();
        assert_eq!(handled.response.source, ResponseSource::Network);
        cache.fetch(nav("/garage")).await.unwrap();

        assert_eq!(cache.db().store("api-cache").len().await.unwrap(), 0);
        assert_eq!(cache.db().store("pages").len().await.unwrap(), 0);
        assert_eq!(cache.db().store("avtoservis-cache-v2").len().await.unwrap(), main_before);
    }

    #[tokio::test]
    async fn test_precached_assets_served_offline() {
        let transport = ScriptedTransport::new();
        let config = test_config();
        for entry in &config.precache {
            transport.respond(config.resolve(&entry.url).unwrap().as_str(), 200, &format!("asset {}", entry.url));
        }
        transport.respond(OFFLINE_URL, 200, "<h1>offline</h1>");
        let cache = offline_cache(transport.clone(), config).await;
        let report = cache.install().await.unwrap();
        assert!(report.failed.is_empty());
        transport.set_offline(true);

        let icon = Request::get(Url::parse("http://app.test/pwa-192x192.png").unwrap());
        let handled = cache.fetch(icon).await.unwrap();
        assert_eq!(handled.response.source, ResponseSource::Cache);
        assert_eq!(handled.response.text(), "asset /pwa-192x192.png");

        let home = cache.fetch(nav("/")).await.unwrap();
        assert_eq!(home.response.source, ResponseSource::Cache);
        assert_eq!(home.response.text(), "asset /");

        let logo = Request::get(Url::parse("http://app.test/src/assets/logo.svg#mark").unwrap());
        assert_eq!(cache.fetch(logo).await.unwrap().response.text(), "asset /src/assets/logo.svg");
    }

    #[tokio::test]
    async fn test_fetch_drops_fragment() {
        let transport = ScriptedTransport::new();
        transport.respond("http://app.test/garage", 200, "garage");
        let cache = offline_cache(transport.clone(), test_config()).await;
        cache.activate().await.unwrap();

        cache.fetch(nav("/garage#top")).await.unwrap();
        assert_eq!(transport.calls_for("http://app.test/garage"), 1);

        let stored = cache.db().store("pages").match_request(&nav("/garage")).await.unwrap();
        assert_eq!(stored.unwrap().text(), "garage");
    }

    #[tokio::test]
    async fn test_fetch_routes_api_to_api_store() {
        let transport = ScriptedTransport::new();
        transport.respond("http://app.test/api/vehicles", 200, "[]");
        let cache = offline_cache(transport.clone(), test_config()).await;
        cache.activate().await.unwrap();

        let req = Request::get(Url::parse("http://app.test/api/vehicles").unwrap());
        cache.fetch(req.clone()).await.unwrap();
        transport.set_offline(true);

        let again = cache.fetch(req.clone()).await.unwrap();
        assert_eq!(again.response.text(), "[]");
        assert_eq!(again.response.source, ResponseSource::Cache);
        assert!(cache.db().store("api-cache").match_request(&req).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_post_is_never_cached() {
        let transport = ScriptedTransport::new();
        transport.respond("http://app.test/api/appointments", 201, "ok");
        let cache = offline_cache(transport.clone(), test_config()).await;
        cache.activate().await.unwrap();

        let mut req = Request::get(Url::parse("http://app.test/api/appointments").unwrap());
        req.method = "POST".into();
        cache.fetch(req.clone()).await.unwrap();

        let mut as_get = req.clone();
        as_get.method = "GET".into();
        assert!(cache.db().store("api-cache").match_request(&as_get).await.unwrap().is_none());
        assert_eq!(cache.db().store("api-cache").len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_allow_list_covers_main_offline_and_routes() {
        let transport = ScriptedTransport::new();
        let cache = offline_cache(transport, test_config()).await;
        let allow = cache.allow_list();

        for name in [
            "avtoservis-cache-v1",
            "offline-html",
            "images",
            "pages",
            "api-cache",
            "google-fonts-stylesheets",
            "google-fonts-webfonts",
        ] {
            assert!(allow.contains(name), "{name} missing from allow-list");
        }
        assert_eq!(allow.len(), 7);
    }

    #[tokio::test]
    async fn test_push_uses_configured_icon() {
        let notifier = Arc::new(RecordingNotifier::default());
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = OfflineCache::new(test_config(), db, ScriptedTransport::new(), notifier.clone()).await.unwrap();

        let outcome = cache.handle(Event::Push(PushPayload::new("Reminder", "Service at 10:00"))).await.unwrap();
        let Outcome::Notified(n) = outcome else { panic!("expected notification") };
        assert_eq!(n.icon, "/pwa-192x192.png");

        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Reminder");
        assert_eq!(shown[0].body, "Service at 10:00");
    }

    #[tokio::test]
    async fn test_online_event() {
        let transport = ScriptedTransport::new();
        let cache = offline_cache(transport, test_config()).await;
        assert!(matches!(cache.handle(Event::Online).await.unwrap(), Outcome::Online));
    }

    #[tokio::test]
    async fn test_skip_waiting_with_nothing_installed_is_noop() {
        let transport = ScriptedTransport::new();
        let cache = offline_cache(transport, test_config()).await;

        let report = cache.message(WorkerMessage::SkipWaiting).await.unwrap();
        assert!(report.is_none());
        assert!(!cache.is_current().await);
    }

    #[test]
    fn test_message_wire_format() {
        let msg: WorkerMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, WorkerMessage::SkipWaiting);
    }
}
