//! Request and response snapshots as seen by the cache.
//!
//! These are transport-neutral: the client crate converts them to and from
//! reqwest types, the store persists them as rows.

use serde::{Deserialize, Serialize};
use url::Url;

/// What the requesting runtime intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    Document,
    Image,
    Font,
    Style,
    Script,
    #[default]
    Empty,
}

impl Destination {
    /// Guess the destination from the file extension of a URL path.
    ///
    /// Used when the caller does not say what the request is for.
    pub fn infer(url: &Url) -> Self {
        let ext = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| last.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match ext.as_deref() {
            Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "ico" | "avif") => Destination::Image,
            Some("woff" | "woff2" | "ttf" | "otf") => Destination::Font,
            Some("css") => Destination::Style,
            Some("js" | "mjs") => Destination::Script,
            Some("html" | "htm") => Destination::Document,
            _ => Destination::Empty,
        }
    }
}

/// Request mode; `Navigate` marks top-level page loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    #[default]
    Cors,
    NoCors,
    SameOrigin,
}

/// An intercepted outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// A plain GET with the destination inferred from the path.
    pub fn get(url: Url) -> Self {
        let destination = Destination::infer(&url);
        Self { method: "GET".into(), url, destination, mode: RequestMode::Cors, headers: Vec::new() }
    }

    /// A top-level page load.
    pub fn navigate(url: Url) -> Self {
        Self {
            method: "GET".into(),
            url,
            destination: Destination::Document,
            mode: RequestMode::Navigate,
            headers: Vec::new(),
        }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// `scheme://host[:port]` of the request URL.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}

/// Where a response handed back to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// The installed offline document stood in for the real page.
    OfflineDocument,
    /// Built locally because neither network nor cache could answer.
    OfflineSynthesized,
}

impl ResponseSource {
    pub fn is_degraded(self) -> bool {
        matches!(self, ResponseSource::OfflineDocument | ResponseSource::OfflineSynthesized)
    }
}

/// A response snapshot: status, ordered headers and the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into(), source: ResponseSource::Network }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// JSON body returned for API requests that could not be served at all.
    pub fn offline_json() -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            body: serde_json::json!({ "error": "offline" }).to_string().into_bytes(),
            source: ResponseSource::OfflineSynthesized,
        }
    }

    /// Case-insensitive header lookup; first value wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
