use std::{io::Read, path::Path, sync::Arc, sync::Weak};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use http::Method;
use serde::Serialize;
use url::Url;

use crate::api::mock::Mock;
use crate::api::response::ResponseTemplate;
use crate::common::data::{Error, MockRequest};
use crate::common::util::BodyBytes;
use crate::matchers::MatchSettings;
use crate::GockCore;

/// Rewrites the incoming request before it is matched.
pub type RequestMapFn = Arc<dyn Fn(MockRequest) -> MockRequest + Send + Sync>;

/// Short-circuits matching: a mock whose filter rejects a request never
/// consults its matcher chain.
pub type RequestFilterFn = Arc<dyn Fn(&MockRequest) -> bool + Send + Sync>;

/// The request shape a mock is willing to accept, built fluently.
///
/// Every criterion is optional; an absent criterion matches anything. Header,
/// query-parameter and path-parameter values are regular expressions, matched
/// unanchored against the incoming value.
///
/// The chain continues into the response side via [`reply`](Expectation::reply)
/// and ends with `register()`:
///
/// ```
/// use httpmimic::Gock;
///
/// let gock = Gock::new();
/// gock.mock("http://foo.com")
///     .post("/bar")
///     .match_header("Authorization", "^Bearer .+$")
///     .body_str("ping")
///     .reply(201)
///     .body_str("pong")
///     .register();
/// ```
pub struct Expectation {
    pub(crate) gock: Weak<GockCore>,
    pub(crate) url: Option<Url>,
    pub(crate) method: Option<Method>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) path_params: Vec<(String, String)>,
    pub(crate) body: Option<BodyBytes>,
    pub(crate) compression: Option<String>,
    pub(crate) times: usize,
    pub(crate) persist: bool,
    pub(crate) mappers: Vec<RequestMapFn>,
    pub(crate) filters: Vec<RequestFilterFn>,
    pub(crate) error: Option<Error>,
    pub(crate) use_network: bool,
}

impl Expectation {
    pub(crate) fn new(gock: Weak<GockCore>) -> Self {
        Self {
            gock,
            url: None,
            method: None,
            headers: Vec::new(),
            params: Vec::new(),
            path_params: Vec::new(),
            body: None,
            compression: None,
            times: 1,
            persist: false,
            mappers: Vec::new(),
            filters: Vec::new(),
            error: None,
            use_network: false,
        }
    }

    /// Parses and assigns the target URL. A string without a scheme is
    /// treated as plain HTTP, so `"foo.com/bar"` becomes
    /// `"http://foo.com/bar"`.
    pub fn url(mut self, uri: &str) -> Self {
        match Url::parse(&normalize_uri(uri)) {
            Ok(url) => self.url = Some(url),
            Err(err) => self.record_error(err.into()),
        }
        self
    }

    /// Assigns an already parsed target URL.
    pub fn set_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Sets the expected HTTP method and, when non-empty, the URL path.
    pub fn method(mut self, method: Method, path: &str) -> Self {
        self.method = Some(method);
        if path.is_empty() {
            return self;
        }
        self.path(path)
    }

    /// Sets the URL path without touching the method.
    pub fn path(mut self, path: &str) -> Self {
        if let Some(url) = &mut self.url {
            url.set_path(path);
        }
        self
    }

    pub fn get(self, path: &str) -> Self {
        self.method(Method::GET, path)
    }

    pub fn post(self, path: &str) -> Self {
        self.method(Method::POST, path)
    }

    pub fn put(self, path: &str) -> Self {
        self.method(Method::PUT, path)
    }

    pub fn delete(self, path: &str) -> Self {
        self.method(Method::DELETE, path)
    }

    pub fn patch(self, path: &str) -> Self {
        self.method(Method::PATCH, path)
    }

    pub fn head(self, path: &str) -> Self {
        self.method(Method::HEAD, path)
    }

    /// Requires the request to carry at least one value for `name` matching
    /// the regular expression `pattern`. Header names compare
    /// case-insensitively.
    pub fn match_header(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.headers.push((name.into(), pattern.into()));
        self
    }

    /// Requires the header to be present with any value.
    pub fn header_present(self, name: impl Into<String>) -> Self {
        self.match_header(name, ".*")
    }

    pub fn match_headers<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, pattern) in pairs {
            self = self.match_header(name, pattern);
        }
        self
    }

    /// Requires the query parameter `name` to carry a value matching
    /// `pattern`.
    pub fn match_param(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.params.push((name.into(), pattern.into()));
        self
    }

    pub fn match_params<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, pattern) in pairs {
            self = self.match_param(name, pattern);
        }
        self
    }

    /// Requires the query parameter to be present with any value.
    pub fn param_present(self, name: impl Into<String>) -> Self {
        self.match_param(name, ".*")
    }

    /// Constrains a path variable. The expectation path must contain a
    /// `{name}` segment; the request segment in the same position must match
    /// `pattern`.
    pub fn path_param(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.path_params.push((name.into(), pattern.into()));
        self
    }

    /// Pre-renders the expected request body from a reader.
    pub fn body(mut self, mut reader: impl Read) -> Self {
        let mut buffer = Vec::new();
        match reader.read_to_end(&mut buffer) {
            Ok(_) => self.body = Some(BodyBytes::from(buffer)),
            Err(err) => self.record_error(err.into()),
        }
        self
    }

    pub fn body_str(mut self, body: impl Into<String>) -> Self {
        self.body = Some(BodyBytes::from(body.into()));
        self
    }

    /// Loads the expected body from a file.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        match std::fs::read(path.as_ref()) {
            Ok(buffer) => self.body = Some(BodyBytes::from(buffer)),
            Err(err) => self.record_error(err.into()),
        }
        self
    }

    /// Expects a JSON body equivalent to `value` (key order and whitespace
    /// independent) and a `Content-Type: application/json` header.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(buffer) => self.body = Some(BodyBytes::from(buffer)),
            Err(err) => self.record_error(err.into()),
        }
        self.match_header("Content-Type", "application/json")
    }

    /// Expects an XML body rendered from `value` and a
    /// `Content-Type: application/xml` header.
    pub fn xml<T: Serialize>(mut self, value: &T) -> Self {
        match quick_xml::se::to_string(value) {
            Ok(body) => self.body = Some(BodyBytes::from(body)),
            Err(err) => self.record_error(Error::Serialize(err.to_string())),
        }
        self.match_header("Content-Type", "application/xml")
    }

    /// Adds a `Content-Type` matcher. Accepts a full MIME type or one of the
    /// configured aliases (`json`, `xml`, `html`, `text`, `form`, `url`);
    /// unknown aliases pass through verbatim.
    pub fn match_type(self, type_or_alias: &str) -> Self {
        let resolved = match self.gock.upgrade() {
            Some(core) => core.settings.read().unwrap().resolve_alias(type_or_alias),
            None => MatchSettings::default().resolve_alias(type_or_alias),
        };
        self.match_header("Content-Type", resolved)
    }

    /// Declares the `Content-Encoding` the request body is expected to carry.
    /// The body is transparently decoded with this scheme before comparison.
    pub fn compression(mut self, scheme: impl Into<String>) -> Self {
        self.compression = Some(scheme.into());
        self
    }

    /// Requires an `Authorization` header carrying the given basic
    /// credentials.
    pub fn basic_auth(self, user: &str, password: &str) -> Self {
        let token = BASE64.encode(format!("{}:{}", user, password));
        self.match_header("Authorization", format!("Basic {}", regex::escape(&token)))
    }

    /// Limits how often the mock may match. Defaults to 1.
    pub fn times(mut self, n: usize) -> Self {
        self.times = n;
        self
    }

    /// Keeps the mock alive regardless of how often it matched. Makes
    /// [`times`](Expectation::times) moot.
    pub fn persist(mut self) -> Self {
        self.persist = true;
        self
    }

    /// Registers a mapper that rewrites the incoming request before matching.
    pub fn map(mut self, f: impl Fn(MockRequest) -> MockRequest + Send + Sync + 'static) -> Self {
        self.mappers.push(Arc::new(f));
        self
    }

    /// Registers a filter; when it returns false, the mock does not match.
    pub fn filter(mut self, f: impl Fn(&MockRequest) -> bool + Send + Sync + 'static) -> Self {
        self.filters.push(Arc::new(f));
        self
    }

    /// Marks the eventual response for real-network passthrough: the
    /// responder decorates a real response instead of fabricating one.
    pub fn enable_networking(mut self) -> Self {
        self.use_network = true;
        self
    }

    /// Transitions to the response side with the given status code.
    pub fn reply(self, status: u16) -> ResponseTemplate {
        ResponseTemplate::from_expectation(self).status(status)
    }

    /// Transitions to the response side, letting a closure configure it.
    pub fn reply_func(self, f: impl FnOnce(ResponseTemplate) -> ResponseTemplate) -> ResponseTemplate {
        f(ResponseTemplate::from_expectation(self))
    }

    /// Registers the mock with an empty 200 response.
    pub fn register(self) -> Mock {
        ResponseTemplate::from_expectation(self).register()
    }

    fn record_error(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    // --- read access for custom matchers ---

    pub fn url_ref(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn method_ref(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn header_patterns(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn param_patterns(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn path_param_patterns(&self) -> &[(String, String)] {
        &self.path_params
    }

    pub fn body_ref(&self) -> Option<&BodyBytes> {
        self.body.as_ref()
    }

    pub fn compression_ref(&self) -> Option<&str> {
        self.compression.as_deref()
    }

    pub fn is_persisted(&self) -> bool {
        self.persist
    }

    /// The host pattern derived from the expectation URL: the host name plus
    /// an explicit non-default port, mirroring what
    /// [`MockRequest::host`] yields on the request side.
    pub(crate) fn host_pattern(&self) -> Option<String> {
        let url = self.url.as_ref()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}

fn normalize_uri(uri: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        uri.to_string()
    } else {
        format!("http://{}", uri)
    }
}
