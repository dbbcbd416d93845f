//! Test doubles: a scripted transport and a recording notifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orc_core::{AppConfig, CacheDb, Error, Request, Response};
use url::Url;

use crate::fetch::Transport;
use crate::push::{Notification, Notifier};
use crate::strategy::{OfflineDocument, StrategyContext};
use crate::worker::OfflineCache;

pub(crate) const OFFLINE_URL: &str = "http://app.test/offline.html";

/// Transport answering from a URL → response table.
///
/// Unknown URLs and every URL while offline fail with `Error::Network`.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Response::new(status, body));
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }

        self.responses
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::Network(format!("connection refused: {}", request.url)))
    }
}

/// Notifier that keeps everything it was asked to show.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) shown: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: Notification) -> Result<(), Error> {
        self.shown.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Strategy context over an in-memory store.
pub(crate) async fn context(transport: Arc<ScriptedTransport>) -> StrategyContext {
    StrategyContext {
        db: CacheDb::open_in_memory().await.unwrap(),
        transport,
        offline: OfflineDocument {
            store: "offline-html".into(),
            request: Request::get(Url::parse(OFFLINE_URL).unwrap()),
        },
    }
}

/// Strategy context over an on-disk database whose entry table was dropped
/// behind its back, so every entry read and write fails.
pub(crate) async fn failing_store_context(transport: Arc<ScriptedTransport>, label: &str) -> StrategyContext {
    let path = std::env::temp_dir().join(format!("orc-failing-{label}-{}.sqlite", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let db = CacheDb::open(&path).await.unwrap();

    let raw = tokio_rusqlite::Connection::open(&path).await.unwrap();
    raw.call(|conn| conn.execute_batch("DROP TABLE cache_entries")).await.unwrap();

    StrategyContext {
        db,
        transport,
        offline: OfflineDocument {
            store: "offline-html".into(),
            request: Request::get(Url::parse(OFFLINE_URL).unwrap()),
        },
    }
}

pub(crate) async fn install_offline_document(ctx: &StrategyContext, body: &str) {
    ctx.db
        .store(&ctx.offline.store)
        .put(&ctx.offline.request, &Response::new(200, body).with_header("content-type", "text/html"))
        .await
        .unwrap();
}

/// Default configuration pointed at the test origin.
pub(crate) fn test_config() -> AppConfig {
    AppConfig { origin: "http://app.test".into(), ..AppConfig::default() }
}

pub(crate) async fn offline_cache(transport: Arc<ScriptedTransport>, config: AppConfig) -> OfflineCache {
    offline_cache_on(CacheDb::open_in_memory().await.unwrap(), transport, config).await
}

/// Cache over an existing database, for upgrade scenarios.
pub(crate) async fn offline_cache_on(db: CacheDb, transport: Arc<ScriptedTransport>, config: AppConfig) -> OfflineCache {
    OfflineCache::new(config, db, transport, Arc::new(RecordingNotifier::default())).await.unwrap()
}
