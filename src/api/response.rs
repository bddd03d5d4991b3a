use std::{io::Read, path::Path, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::api::expectation::Expectation;
use crate::api::mock::Mock;
use crate::common::data::Error;
use crate::common::util::BodyBytes;
use crate::Gock;

/// Transforms the outgoing response; may replace it wholesale.
pub type ResponseMapFn = Arc<dyn Fn(Response<Bytes>) -> Response<Bytes> + Send + Sync>;

/// Short-circuits response synthesis: when a filter returns false, the base
/// response is returned unchanged.
pub type ResponseFilterFn = Arc<dyn Fn(&Response<Bytes>) -> bool + Send + Sync>;

/// Produces a response body lazily at reply time. A generated body reports an
/// unknown length: the synthesized response carries no `Content-Length`
/// header.
pub type BodyProducer = Arc<dyn Fn() -> Box<dyn Read + Send> + Send + Sync>;

/// The response shape a mock produces, built fluently.
///
/// Obtained from [`Expectation::reply`]; `register()` ends the chain and
/// stores the mock:
///
/// ```
/// use httpmimic::Gock;
///
/// let gock = Gock::new();
/// gock.mock("http://foo.com")
///     .get("/bar")
///     .reply(200)
///     .set_header("Content-Type", "text/plain")
///     .body_str("hello")
///     .register();
/// ```
pub struct ResponseTemplate {
    pub(crate) expectation: Option<Expectation>,
    pub(crate) status: Option<StatusCode>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<BodyBytes>,
    pub(crate) body_producer: Option<BodyProducer>,
    pub(crate) error: Option<Error>,
    pub(crate) delay: Option<Duration>,
    pub(crate) mappers: Vec<ResponseMapFn>,
    pub(crate) filters: Vec<ResponseFilterFn>,
    pub(crate) use_network: bool,
}

impl ResponseTemplate {
    pub(crate) fn from_expectation(expectation: Expectation) -> Self {
        let use_network = expectation.use_network;
        Self {
            expectation: Some(expectation),
            status: None,
            headers: Vec::new(),
            body: None,
            body_producer: None,
            error: None,
            delay: None,
            mappers: Vec::new(),
            filters: Vec::new(),
            use_network,
        }
    }

    /// Sets the response status code.
    pub fn status(mut self, status: u16) -> Self {
        match StatusCode::from_u16(status) {
            Ok(status) => self.status = Some(status),
            Err(err) => self.record_error(Error::Response(err.to_string())),
        }
        self
    }

    /// Sets a header, replacing any previously declared value for the same
    /// name.
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Adds a header value without replacing existing ones.
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn set_headers<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in pairs {
            self = self.set_header(name, value);
        }
        self
    }

    /// Pre-renders the response body from a reader.
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

    /// Installs a lazy body producer, invoked at reply time. When both a
    /// producer and a pre-rendered buffer are set, the producer wins and the
    /// response carries no `Content-Length` header.
    pub fn body_gen(mut self, f: impl Fn() -> Box<dyn Read + Send> + Send + Sync + 'static) -> Self {
        self.body_producer = Some(Arc::new(f));
        self
    }

    /// Serializes `value` as the JSON response body and sets
    /// `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(buffer) => self.body = Some(BodyBytes::from(buffer)),
            Err(err) => self.record_error(err.into()),
        }
        self.set_header("Content-Type", "application/json")
    }

    /// Serializes `value` as the XML response body and sets
    /// `Content-Type: application/xml`.
    pub fn xml<T: Serialize>(mut self, value: &T) -> Self {
        match quick_xml::se::to_string(value) {
            Ok(body) => self.body = Some(BodyBytes::from(body)),
            Err(err) => self.record_error(Error::Serialize(err.to_string())),
        }
        self.set_header("Content-Type", "application/xml")
    }

    /// Loads the response body from a file.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        match std::fs::read(path.as_ref()) {
            Ok(buffer) => self.body = Some(BodyBytes::from(buffer)),
            Err(err) => self.record_error(err.into()),
        }
        self
    }

    /// Delays the synthesized response. The wait cooperates with the
    /// request's [`CancelToken`](crate::CancelToken), if one is attached.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes the transport fail the request with `err` instead of returning a
    /// response.
    pub fn set_error(mut self, err: impl Into<Error>) -> Self {
        self.error = Some(err.into());
        self
    }

    /// Registers a mapper applied to the synthesized response.
    pub fn map(mut self, f: impl Fn(Response<Bytes>) -> Response<Bytes> + Send + Sync + 'static) -> Self {
        self.mappers.push(Arc::new(f));
        self
    }

    /// Registers a filter; when it returns false, synthesis stops and the
    /// base response is returned unchanged.
    pub fn filter(mut self, f: impl Fn(&Response<Bytes>) -> bool + Send + Sync + 'static) -> Self {
        self.filters.push(Arc::new(f));
        self
    }

    /// Replies with a decorated real-network response instead of a fabricated
    /// one.
    pub fn enable_networking(mut self) -> Self {
        self.use_network = true;
        self
    }

    /// Builds the mock and stores it in the registry of the [`Gock`] instance
    /// the chain started from.
    pub fn register(mut self) -> Mock {
        let mut expectation = self
            .expectation
            .take()
            .expect("response template is detached from its expectation");

        // Construction errors surface the next time this mock would reply.
        if self.error.is_none() {
            if let Some(err) = expectation.error.take() {
                self.error = Some(err);
            }
        }

        let gock = expectation.gock.upgrade().map(Gock::from_core);
        let chain = match &gock {
            Some(gock) => gock.default_matcher(),
            None => crate::matchers::MatcherChain::detached_default(),
        };

        let mock = Mock::new(expectation, self, chain);
        match gock {
            Some(gock) => gock.register(mock.clone()),
            None => warn!("mock registered after its Gock instance was dropped; it will never match"),
        }
        mock
    }

    fn record_error(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}
