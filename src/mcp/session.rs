// MCP session cache
//! Session Manager: one persistent, initialized connection per
//! `(base_url, header set)`.
//!
//! Each cache key owns an async mutex slot, so concurrent `get_or_create`
//! calls for the same server serialize and at most one handshake per key is
//! in flight. Sessions themselves are `Arc`-shared; a READY session serves
//! concurrent calls and hands out request ids from an atomic counter.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::config::McpSettings;
use super::error::McpError;

/// Header used to echo a server-assigned session id back to the server.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

// ── Endpoint + key ──────────────────────────────────────────────────────────

/// Where to reach one MCP server and which headers to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub url: String,
    /// Lower-cased header name -> value.
    pub headers: BTreeMap<String, String>,
}

impl ServerEndpoint {
    pub fn new(url: &str) -> Self {
        Self::with_headers(url, BTreeMap::new())
    }

    pub fn with_headers(url: &str, headers: BTreeMap<String, String>) -> Self {
        Self {
            url: clean_url(url),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        }
    }

    /// Cache key: the URL plus a fingerprint of the canonical header set.
    pub fn key(&self) -> SessionKey {
        let mut hasher = Sha256::new();
        for (name, value) in &self.headers {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        SessionKey {
            base_url: self.url.clone(),
            header_fingerprint: hex::encode(hasher.finalize()),
        }
    }
}

/// Strip the trailing punctuation / quotes / whitespace that creeps in when
/// URLs are lifted out of prose.
fn clean_url(url: &str) -> String {
    url.trim()
        .trim_end_matches(|c: char| matches!(c, '"' | ',' | ';' | '!' | '?' | ' '))
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    base_url: String,
    header_fingerprint: String,
}

impl SessionKey {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn header_fingerprint(&self) -> &str {
        &self.header_fingerprint
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.base_url, &self.header_fingerprint[..12])
    }
}

// ── Session state machine ───────────────────────────────────────────────────

/// Handshake state of a session (stored as u8 for lock-free reads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    /// Terminal: handshake failed, transport broke, or the session was closed.
    Failed,
}

const STATE_UNINITIALIZED: u8 = 0;
const STATE_INITIALIZING: u8 = 1;
const STATE_READY: u8 = 2;
const STATE_FAILED: u8 = 3;

impl SessionState {
    fn as_u8(self) -> u8 {
        match self {
            SessionState::Uninitialized => STATE_UNINITIALIZED,
            SessionState::Initializing => STATE_INITIALIZING,
            SessionState::Ready => STATE_READY,
            SessionState::Failed => STATE_FAILED,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            STATE_UNINITIALIZED => SessionState::Uninitialized,
            STATE_INITIALIZING => SessionState::Initializing,
            STATE_READY => SessionState::Ready,
            _ => SessionState::Failed,
        }
    }
}

/// What the server told us during `initialize`.
#[derive(Debug, Clone, Default)]
pub struct Negotiated {
    pub session_id: Option<String>,
    pub protocol_version: Option<String>,
    pub server_info: Value,
    pub capabilities: Value,
}

/// Raw HTTP reply to one POST.
#[derive(Debug)]
pub(crate) struct HttpReply {
    pub status: StatusCode,
    pub session_id: Option<String>,
    pub content_type: String,
    pub body: String,
}

// ── Session ─────────────────────────────────────────────────────────────────

/// Stateful connection to one MCP server.
///
/// Owned by [`SessionManager`]; callers borrow an `Arc` for the duration of a
/// single call and re-fetch for the next one.
#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    url: String,
    /// Keeps the connection pool and cookie jar alive for the session.
    http: Client,
    state: AtomicU8,
    next_id: AtomicU64,
    negotiated: OnceLock<Negotiated>,
}

impl Session {
    pub(crate) fn open(endpoint: &ServerEndpoint, settings: &McpSettings) -> Result<Self, McpError> {
        let connect_err = |message: String| McpError::Connect {
            url: endpoint.url.clone(),
            message,
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );
        for (name, value) in &endpoint.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| connect_err(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| connect_err(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .connect_timeout(settings.init_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| connect_err(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            key: endpoint.key(),
            url: endpoint.url.clone(),
            http,
            state: AtomicU8::new(STATE_UNINITIALIZED),
            next_id: AtomicU64::new(1),
            negotiated: OnceLock::new(),
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn negotiated(&self) -> Option<&Negotiated> {
        self.negotiated.get()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.negotiated.get().and_then(|n| n.session_id.as_deref())
    }

    /// Allocate the next JSON-RPC request id. Never reused on this session.
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next call will get, without consuming it.
    pub fn peek_next_id(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn set_negotiated(&self, negotiated: Negotiated) {
        // First write wins; a session handshakes exactly once.
        let _ = self.negotiated.set(negotiated);
    }

    /// Mark READY. Id 1 was consumed by `initialize`, so calls start at 2.
    pub(crate) fn mark_ready(&self) {
        self.next_id.store(2, Ordering::SeqCst);
        self.set_state(SessionState::Ready);
    }

    /// Terminal close. The HTTP pool is released when the last `Arc` drops.
    pub(crate) fn close(&self) {
        self.set_state(SessionState::Failed);
    }

    /// POST one JSON-RPC message to the server.
    pub(crate) async fn post(&self, body: &Value, timeout: Duration) -> Result<HttpReply, reqwest::Error> {
        let mut req = self.http.post(&self.url).timeout(timeout).json(body);
        if let Some(sid) = self.session_id() {
            req = req.header(SESSION_ID_HEADER, sid);
        }

        let response = req.send().await?;
        let status = response.status();
        let session_id = ["mcp-session-id", "x-session-id", "session-id"]
            .iter()
            .find_map(|h| response.headers().get(*h))
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        Ok(HttpReply {
            status,
            session_id,
            content_type,
            body,
        })
    }
}

// ── Session Manager ─────────────────────────────────────────────────────────

type Slot = Arc<tokio::sync::Mutex<Option<Arc<Session>>>>;

/// Process-wide owner of all MCP sessions.
pub struct SessionManager {
    settings: McpSettings,
    slots: Mutex<HashMap<SessionKey, Slot>>,
    handshakes: AtomicU64,
}

impl SessionManager {
    pub fn new(settings: McpSettings) -> Self {
        Self {
            settings,
            slots: Mutex::new(HashMap::new()),
            handshakes: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &McpSettings {
        &self.settings
    }

    fn slot(&self, key: &SessionKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.entry(key.clone()).or_default().clone()
    }

    fn all_slots(&self) -> Vec<Slot> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.values().cloned().collect()
    }

    /// Return the cached READY session for `endpoint`, or handshake a new one.
    pub async fn get_or_create(&self, endpoint: &ServerEndpoint) -> Result<Arc<Session>, McpError> {
        let key = endpoint.key();
        let slot = self.slot(&key);
        let mut guard = slot.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.is_ready() {
                tracing::debug!("MCP: using cached session for {}", key);
                return Ok(session.clone());
            }
            // Not ready means it was closed under us; drop it and re-handshake.
            guard.take();
        }

        tracing::info!("MCP: creating new session for {}", endpoint.url);
        let session = Arc::new(Session::open(endpoint, &self.settings)?);
        self.handshakes.fetch_add(1, Ordering::Relaxed);
        super::client::initialize(&session, &self.settings).await?;

        *guard = Some(session.clone());
        Ok(session)
    }

    /// Current cached session for `key`, if any. Never handshakes.
    pub async fn cached(&self, key: &SessionKey) -> Option<Arc<Session>> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.get(key).cloned()
        }?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Close and drop the session for `key`. Returns whether one was cached.
    pub async fn invalidate(&self, key: &SessionKey) -> bool {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.get(key).cloned()
        };
        let Some(slot) = slot else {
            return false;
        };
        let taken = slot.lock().await.take();
        match taken {
            Some(session) => {
                session.close();
                tracing::info!("MCP: session for {} invalidated", key);
                true
            }
            None => false,
        }
    }

    /// Drop `session` only if it is still the cached one for its key, so a
    /// newer session created by a concurrent caller survives.
    pub async fn invalidate_session(&self, session: &Arc<Session>) -> bool {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.get(session.key()).cloned()
        };
        session.close();
        let Some(slot) = slot else {
            return false;
        };
        let mut guard = slot.lock().await;
        if guard.as_ref().is_some_and(|cached| Arc::ptr_eq(cached, session)) {
            guard.take();
            tracing::info!("MCP: session for {} invalidated", session.key());
            true
        } else {
            false
        }
    }

    /// Close every session and clear the cache. Returns how many were closed.
    ///
    /// Slots stay in the map: a caller that already holds a slot must keep
    /// sharing it with later callers for the same key.
    pub async fn invalidate_all(&self) -> usize {
        let mut closed = 0;
        for slot in self.all_slots() {
            if let Some(session) = slot.lock().await.take() {
                session.close();
                closed += 1;
            }
        }
        tracing::info!("MCP: all sessions closed and cache cleared ({} closed)", closed);
        closed
    }

    /// Number of sessions currently cached.
    pub async fn live_sessions(&self) -> usize {
        let mut live = 0;
        for slot in self.all_slots() {
            if slot.lock().await.is_some() {
                live += 1;
            }
        }
        live
    }

    /// Handshakes attempted since startup.
    pub fn handshake_count(&self) -> u64 {
        self.handshakes.load(Ordering::Relaxed)
    }
}
