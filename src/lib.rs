//! HTTP mocking library that intercepts client traffic at the transport
//! layer.
//!
//! # Features
//! * Simple, expressive, fluent API.
//! * Interception at the transport seam: no listening socket, no server.
//! * Many built-in request matchers (method, scheme, host, path, path
//!   params, headers, query params, body) with regex patterns everywhere.
//! * JSON and URL-encoded-form body equivalence, transparent gzip decoding.
//! * Counted mocks ([`times`](Expectation::times)), persistent mocks
//!   ([`persist`](Expectation::persist)), unmatched-request tracking.
//! * Real-network passthrough with per-request filters.
//! * Delay simulation that cooperates with request cancellation.
//! * Extensible request matching, per mock and globally.
//!
//! # Getting Started
//!
//! Declare a mock, then drive the code under test through an intercepting
//! [`Transport`] (or a [`Client`] wrapped with
//! [`Gock::intercept_client`]):
//!
//! ```
//! use httpmimic::{Gock, RoundTrip};
//! use bytes::Bytes;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let gock = Gock::new();
//! gock.mock("http://example.com")
//!     .get("/hello")
//!     .reply(200)
//!     .body_str("world")
//!     .register();
//!
//! let transport = gock.transport();
//! let req = http::Request::builder()
//!     .method("GET")
//!     .uri("http://example.com/hello")
//!     .body(Bytes::new())
//!     .unwrap();
//!
//! let res = transport.round_trip(req).await.unwrap();
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.body().as_ref(), b"world");
//! assert!(gock.is_done());
//! # });
//! ```
//!
//! # Instances and the global façade
//!
//! The primary API is the explicit [`Gock`] instance: every instance owns its
//! own registry, configuration and interception toggle, so parallel tests can
//! stay fully isolated. The crate root additionally exposes the same surface
//! as free functions over one process-wide instance ([`mock`], [`off`],
//! [`is_done`], …) for the classic global style.
//!
//! # Unmatched requests
//!
//! While interception is active, a request no mock accepts fails with
//! [`Error::CannotMatch`] and is recorded; tests can assert on the log via
//! [`Gock::unmatched_requests`]. [`Gock::is_done`] is the primary assertion
//! for "all declared mocks were consumed".
//!
//! # Debugging
//!
//! The crate logs against [`tracing`] (with the `log` compatibility layer
//! enabled, so any `log` backend works). The most useful level is `debug`.
//! For a wire-level view of intercepted traffic, install the bundled
//! [`dump_request`] observer: `gock.observe(httpmimic::dump_request)`.

#[macro_use]
extern crate lazy_static;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

mod api;
mod common;
pub mod matchers;
mod registry;
mod responder;
mod transport;

pub use api::{
    BodyProducer, Expectation, Mock, RequestFilterFn, RequestMapFn, ResponseFilterFn,
    ResponseMapFn, ResponseTemplate,
};
pub use common::cancel::CancelToken;
pub use common::data::{Error, MockRequest};
pub use common::http::{Client, NetworkClient, RoundTrip};
pub use common::util::{BodyBytes, Join};
pub use matchers::{MatchFn, MatchSettings, MatcherChain};
pub use transport::Transport;

use registry::Registry;

/// Inspects every intercepted request together with the mock that matched it,
/// if any. Runs inside the match critical section: a blocking observer
/// serializes intercepted traffic.
pub type ObserverFn = Arc<dyn Fn(&MockRequest, Option<&Mock>) + Send + Sync>;

/// Per-request veto over real-network passthrough. Networking is used only
/// when every registered filter returns true.
pub type NetworkFilterFn = Arc<dyn Fn(&MockRequest) -> bool + Send + Sync>;

#[derive(Default)]
struct Config {
    networking: bool,
    networking_filters: Vec<NetworkFilterFn>,
    observer: Option<ObserverFn>,
}

pub(crate) struct GockCore {
    config: Mutex<Config>,
    registry: Registry,
    pub(crate) settings: Arc<RwLock<MatchSettings>>,
    default_matcher: RwLock<MatcherChain>,
    native: Arc<dyn RoundTrip>,
    intercepting: AtomicBool,
}

/// An isolated mocking universe: registry, match settings, networking policy
/// and interception toggle.
///
/// `Gock` is a cheap handle; clones share the same state. Create one per test
/// for isolation, or use the crate-level free functions for the process-wide
/// instance.
#[derive(Clone)]
pub struct Gock {
    core: Arc<GockCore>,
}

impl Gock {
    pub fn new() -> Self {
        let settings = Arc::new(RwLock::new(MatchSettings::default()));
        let default_matcher = MatcherChain::full(&settings);
        Self {
            core: Arc::new(GockCore {
                config: Mutex::new(Config::default()),
                registry: Registry::new(),
                settings,
                default_matcher: RwLock::new(default_matcher),
                native: Arc::new(NetworkClient::new()),
                intercepting: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_core(core: Arc<GockCore>) -> Self {
        Self { core }
    }

    // ===========================================================================================
    // Mock declaration
    // ===========================================================================================

    /// Starts a new mock for the given URI and enables interception. The
    /// fluent chain ends with `register()`:
    ///
    /// ```
    /// use httpmimic::Gock;
    ///
    /// let gock = Gock::new();
    /// gock.mock("http://foo.com").get("/bar").reply(200).register();
    /// assert!(gock.is_pending());
    /// ```
    pub fn mock(&self, uri: &str) -> Expectation {
        self.intercept();
        Expectation::new(Arc::downgrade(&self.core)).url(uri)
    }

    /// Stores an already built mock. Idempotent: registering the same mock
    /// twice keeps one entry.
    pub fn register(&self, mock: Mock) {
        self.core.registry.register(mock);
    }

    // ===========================================================================================
    // Interception lifecycle
    // ===========================================================================================

    /// Enables interception for every transport of this instance.
    pub fn intercept(&self) {
        self.core.intercepting.store(true, Ordering::SeqCst);
    }

    /// True while interception is enabled.
    pub fn intercepting(&self) -> bool {
        self.core.intercepting.load(Ordering::SeqCst)
    }

    /// Disables interception; transports become pure passthrough.
    pub fn disable(&self) {
        self.core.intercepting.store(false, Ordering::SeqCst);
    }

    /// Flushes the registry and disables interception.
    pub fn off(&self) {
        self.flush();
        self.disable();
    }

    /// Like [`off`](Gock::off), but also clears the unmatched-request log.
    pub fn off_all(&self) {
        self.off();
        self.clean_unmatched_requests();
    }

    // ===========================================================================================
    // Transports and clients
    // ===========================================================================================

    /// An intercepting transport whose passthrough goes to the real network.
    pub fn transport(&self) -> Transport {
        Transport::new(self.clone(), None)
    }

    /// An intercepting transport wrapping a custom upstream transport.
    pub fn transport_with(&self, inner: Arc<dyn RoundTrip>) -> Transport {
        Transport::new(self.clone(), Some(inner))
    }

    /// A ready-to-use [`Client`] that is already intercepted.
    pub fn client(&self) -> Client {
        let client = Client::new();
        self.intercept_client(&client);
        client
    }

    /// Swaps the client's transport for an intercepting one that wraps the
    /// original. A client that is already intercepted is left untouched.
    pub fn intercept_client(&self, client: &Client) {
        let original = client.transport();
        client.install(Arc::new(self.transport_with(original)));
    }

    /// Restores the transport [`intercept_client`](Gock::intercept_client)
    /// replaced.
    pub fn restore_client(&self, client: &Client) {
        client.uninstall();
    }

    pub(crate) fn native_transport(&self) -> Arc<dyn RoundTrip> {
        self.core.native.clone()
    }

    // ===========================================================================================
    // Networking policy
    // ===========================================================================================

    /// Permits real-network passthrough for requests no mock matches (subject
    /// to the registered filters).
    pub fn enable_networking(&self) {
        self.core.config.lock().unwrap().networking = true;
    }

    pub fn disable_networking(&self) {
        self.core.config.lock().unwrap().networking = false;
    }

    /// Registers a passthrough veto; networking is used only when every
    /// filter returns true for the request.
    pub fn networking_filter(&self, f: impl Fn(&MockRequest) -> bool + Send + Sync + 'static) {
        self.core
            .config
            .lock()
            .unwrap()
            .networking_filters
            .push(Arc::new(f));
    }

    pub fn disable_networking_filters(&self) {
        self.core.config.lock().unwrap().networking_filters.clear();
    }

    pub(crate) fn should_use_network(&self, req: &MockRequest, mock: Option<&Mock>) -> bool {
        if let Some(mock) = mock {
            if mock.response().use_network {
                return true;
            }
        }

        let (networking, filters) = {
            let config = self.core.config.lock().unwrap();
            (config.networking, config.networking_filters.clone())
        };
        if !networking {
            return false;
        }
        filters.iter().all(|filter| filter(req))
    }

    // ===========================================================================================
    // Observation
    // ===========================================================================================

    /// Installs an observer invoked for every intercepted request, with the
    /// matching mock if one was selected. See [`dump_request`] for a bundled
    /// implementation.
    pub fn observe(&self, f: impl Fn(&MockRequest, Option<&Mock>) + Send + Sync + 'static) {
        self.core.config.lock().unwrap().observer = Some(Arc::new(f));
    }

    pub(crate) fn notify_observer(&self, req: &MockRequest, mock: Option<&Mock>) {
        let observer = self.core.config.lock().unwrap().observer.clone();
        if let Some(observer) = observer {
            observer(req, mock);
        }
    }

    // ===========================================================================================
    // Matching
    // ===========================================================================================

    /// Finds the first registered mock matching the request, in registration
    /// order. A matcher error aborts the scan.
    pub(crate) fn match_mock(&self, req: &MockRequest) -> Result<Option<Mock>, Error> {
        for mock in self.core.registry.get_all() {
            if mock.matches(req)? {
                debug!("mock matched for {} {}", req.method(), req.uri());
                return Ok(Some(mock));
            }
        }
        debug!("no mock matched for {} {}", req.method(), req.uri());
        Ok(None)
    }

    /// The matcher chain template newly registered mocks start from.
    pub fn default_matcher(&self) -> MatcherChain {
        self.core.default_matcher.read().unwrap().clone()
    }

    pub fn set_default_matcher(&self, chain: MatcherChain) {
        *self.core.default_matcher.write().unwrap() = chain;
    }

    // ===========================================================================================
    // Match settings
    // ===========================================================================================

    /// MIME types whose bodies participate in body matching.
    pub fn body_types(&self) -> Vec<String> {
        self.core.settings.read().unwrap().body_types.clone()
    }

    pub fn set_body_types(&self, types: Vec<String>) {
        self.core.settings.write().unwrap().body_types = types;
    }

    pub fn body_type_aliases(&self) -> Vec<(String, String)> {
        self.core.settings.read().unwrap().body_type_aliases.clone()
    }

    pub fn set_body_type_aliases(&self, aliases: Vec<(String, String)>) {
        self.core.settings.write().unwrap().body_type_aliases = aliases;
    }

    /// `Content-Encoding` values the body matcher can transparently decode.
    pub fn compression_schemes(&self) -> Vec<String> {
        self.core.settings.read().unwrap().compression_schemes.clone()
    }

    pub fn set_compression_schemes(&self, schemes: Vec<String>) {
        self.core.settings.write().unwrap().compression_schemes = schemes;
    }

    // ===========================================================================================
    // Registry introspection
    // ===========================================================================================

    /// A snapshot of all registered mocks in registration order.
    pub fn get_all(&self) -> Vec<Mock> {
        self.core.registry.get_all()
    }

    /// Prunes done mocks, then returns the survivors.
    pub fn pending(&self) -> Vec<Mock> {
        self.core.registry.pending()
    }

    /// True when every registered mock has been consumed. The primary test
    /// assertion of this crate.
    pub fn is_done(&self) -> bool {
        self.core.registry.is_done()
    }

    pub fn is_pending(&self) -> bool {
        self.core.registry.is_pending()
    }

    /// Removes mocks that are done (disabled, or counter-exhausted and
    /// non-persisted).
    pub fn clean(&self) {
        self.core.registry.clean();
    }

    /// Empties the registry.
    pub fn flush(&self) {
        self.core.registry.flush();
    }

    pub fn remove(&self, mock: &Mock) {
        self.core.registry.remove(mock);
    }

    pub fn exists(&self, mock: &Mock) -> bool {
        self.core.registry.exists(mock)
    }

    /// Requests that were intercepted but matched no mock, in arrival order.
    pub fn unmatched_requests(&self) -> Vec<MockRequest> {
        self.core.registry.unmatched_requests()
    }

    pub fn has_unmatched_request(&self) -> bool {
        self.core.registry.has_unmatched_request()
    }

    pub fn clean_unmatched_requests(&self) {
        self.core.registry.clean_unmatched();
    }

    pub(crate) fn track_unmatched(&self, req: MockRequest) {
        self.core.registry.track_unmatched(req);
    }
}

impl Default for Gock {
    fn default() -> Self {
        Self::new()
    }
}

/// Default observer: prints an HTTP/1.1 wire-format dump of the intercepted
/// request and whether a mock matched.
pub fn dump_request(req: &MockRequest, mock: Option<&Mock>) {
    let path = match req.query() {
        Some(query) => format!("{}?{}", req.path(), query),
        None => req.path().to_string(),
    };
    println!("{} {} {:?}", req.method(), path, req.version());
    println!("Host: {}", req.host());
    for (name, value) in req.headers_vec() {
        if !name.eq_ignore_ascii_case("host") {
            println!("{}: {}", name, value);
        }
    }
    if !req.body().is_empty() {
        println!("\n{}", req.body().to_maybe_lossy_str());
    }
    println!("\nMatches: {}\n---", mock.is_some());
}

// ===============================================================================================
// Global façade
// ===============================================================================================

lazy_static! {
    static ref GLOBAL: Gock = Gock::new();
}

/// The process-wide instance backing the crate-level free functions.
pub fn global() -> Gock {
    GLOBAL.clone()
}

/// Starts a new mock on the process-wide instance. See [`Gock::mock`].
pub fn mock(uri: &str) -> Expectation {
    GLOBAL.mock(uri)
}

pub fn intercept() {
    GLOBAL.intercept()
}

pub fn intercepting() -> bool {
    GLOBAL.intercepting()
}

pub fn disable() {
    GLOBAL.disable()
}

pub fn off() {
    GLOBAL.off()
}

pub fn off_all() {
    GLOBAL.off_all()
}

pub fn transport() -> Transport {
    GLOBAL.transport()
}

pub fn client() -> Client {
    GLOBAL.client()
}

pub fn intercept_client(client: &Client) {
    GLOBAL.intercept_client(client)
}

pub fn restore_client(client: &Client) {
    GLOBAL.restore_client(client)
}

pub fn observe(f: impl Fn(&MockRequest, Option<&Mock>) + Send + Sync + 'static) {
    GLOBAL.observe(f)
}

pub fn enable_networking() {
    GLOBAL.enable_networking()
}

pub fn disable_networking() {
    GLOBAL.disable_networking()
}

pub fn networking_filter(f: impl Fn(&MockRequest) -> bool + Send + Sync + 'static) {
    GLOBAL.networking_filter(f)
}

pub fn disable_networking_filters() {
    GLOBAL.disable_networking_filters()
}

pub fn get_all() -> Vec<Mock> {
    GLOBAL.get_all()
}

pub fn pending() -> Vec<Mock> {
    GLOBAL.pending()
}

pub fn is_done() -> bool {
    GLOBAL.is_done()
}

pub fn is_pending() -> bool {
    GLOBAL.is_pending()
}

pub fn clean() {
    GLOBAL.clean()
}

pub fn flush() {
    GLOBAL.flush()
}

pub fn remove(mock: &Mock) {
    GLOBAL.remove(mock)
}

pub fn exists(mock: &Mock) -> bool {
    GLOBAL.exists(mock)
}

pub fn unmatched_requests() -> Vec<MockRequest> {
    GLOBAL.unmatched_requests()
}

pub fn has_unmatched_request() -> bool {
    GLOBAL.has_unmatched_request()
}

pub fn clean_unmatched_requests() {
    GLOBAL.clean_unmatched_requests()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mock_enables_interception_test() {
        let gock = Gock::new();
        assert!(!gock.intercepting());
        gock.mock("http://foo.com").reply(200).register();
        assert!(gock.intercepting());

        gock.off();
        assert!(!gock.intercepting());
        assert!(gock.get_all().is_empty());
    }

    #[test]
    fn clones_share_state_test() {
        let gock = Gock::new();
        let clone = gock.clone();
        gock.mock("http://foo.com").reply(200).register();
        assert_eq!(clone.get_all().len(), 1);
    }

    #[test]
    fn registered_mock_uses_default_matcher_template_test() {
        let gock = Gock::new();
        let mock = gock.mock("http://foo.com").reply(200).register();
        assert_eq!(mock.matcher().len(), gock.default_matcher().len());
    }

    #[test]
    fn settings_roundtrip_test() {
        let gock = Gock::new();
        assert!(gock.body_types().contains(&"application/json".to_string()));
        assert_eq!(gock.compression_schemes(), vec!["gzip".to_string()]);

        gock.set_compression_schemes(vec!["gzip".to_string(), "deflate".to_string()]);
        assert_eq!(gock.compression_schemes().len(), 2);
    }

    #[test]
    fn networking_decision_test() {
        let gock = Gock::new();
        let req = http::Request::builder()
            .uri("http://foo.com/bar")
            .body(bytes::Bytes::new())
            .unwrap();
        let req = MockRequest::try_from(&req).unwrap();

        assert!(!gock.should_use_network(&req, None));

        gock.enable_networking();
        assert!(gock.should_use_network(&req, None));

        gock.networking_filter(|r| r.path() == "/other");
        assert!(!gock.should_use_network(&req, None));

        gock.disable_networking_filters();
        assert!(gock.should_use_network(&req, None));

        gock.disable_networking();
        assert!(!gock.should_use_network(&req, None));
    }
}
