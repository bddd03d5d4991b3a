
use bytes::Bytes;
use http::{Method, Uri, Version};

use crate::common::util::BodyBytes;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// Interception is active, no mock matched the request and real
    /// networking was not permitted. This is the sentinel the transport
    /// returns for every unmatched request.
    #[error("cannot match any request")]
    CannotMatch,

    /// The request was cancelled while the response was being synthesized.
    #[error("request canceled")]
    Canceled,

    /// A matcher predicate failed, e.g. because an expectation carries an
    /// invalid regular expression.
    #[error("matcher failed: {0}")]
    Matcher(String),

    /// The expectation URL could not be parsed.
    #[error("invalid mock URL: {0}")]
    Url(String),

    /// Reading a body file or a generated body reader failed.
    #[error("i/o error: {0}")]
    Io(String),

    /// A JSON or XML body could not be serialized.
    #[error("cannot serialize mock body: {0}")]
    Serialize(String),

    /// A synthesized response could not be assembled, e.g. because a
    /// template header is not a valid header name or value.
    #[error("invalid mock response: {0}")]
    Response(String),

    /// The real-network round trip failed.
    #[error("network error: {0}")]
    Network(String),

    /// A user-provided error installed with
    /// [`ResponseTemplate::set_error`](crate::ResponseTemplate::set_error).
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Url(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Matcher(err.to_string())
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Error::Response(err.to_string())
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

/// The intercepted request as the matching pipeline sees it.
///
/// The body is fully buffered, so matching never consumes anything: the
/// transport keeps forwarding the original `http::Request` bytes regardless of
/// how often the body was inspected or decompressed for comparison.
#[derive(Debug, Clone)]
pub struct MockRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: Vec<(String, String)>,
    body: BodyBytes,
}

impl MockRequest {
    pub(crate) fn new(
        method: Method,
        uri: Uri,
        version: Version,
        headers: Vec<(String, String)>,
        body: BodyBytes,
    ) -> Self {
        Self {
            method,
            uri,
            version,
            headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The URI scheme; client requests carry absolute URIs, but should one
    /// arrive without a scheme it is treated as plain HTTP.
    pub fn scheme(&self) -> &str {
        self.uri.scheme_str().unwrap_or("http")
    }

    /// The request host, including an explicit non-default port
    /// (`127.0.0.1:1234`), taken from the URI authority or the `Host` header.
    pub fn host(&self) -> String {
        let (host, port) = match self.uri.authority() {
            Some(authority) => (
                authority.host().to_string(),
                authority.port_u16().map(|p| p.to_string()),
            ),
            None => {
                let header = self.header("host").into_iter().next().unwrap_or_default();
                let mut parts = header.splitn(2, ':');
                (
                    parts.next().unwrap_or_default().to_string(),
                    parts.next().map(|p| p.to_string()),
                )
            }
        };

        match port.as_deref() {
            None | Some("80") if self.scheme() == "http" => host,
            None | Some("443") if self.scheme() == "https" => host,
            None => host,
            Some(port) => format!("{}:{}", host, port),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Percent-decoded query parameters in declaration order. Repeated keys
    /// are preserved, so the result is a multimap.
    pub fn query_params(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(self.query().unwrap_or("").as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn headers_vec(&self) -> &[(String, String)] {
        &self.headers
    }

    /// All values carried for the given header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// The media type of the request without parameters, e.g.
    /// `application/json` for `application/json; charset=utf-8`.
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type")
            .into_iter()
            .next()
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
    }

    pub fn content_encoding(&self) -> Option<String> {
        self.header("content-encoding")
            .into_iter()
            .next()
            .map(|v| v.trim().to_string())
    }

    pub fn body(&self) -> &BodyBytes {
        &self.body
    }

    pub fn body_str(&self) -> std::borrow::Cow<str> {
        self.body.to_maybe_lossy_str()
    }

    pub(crate) fn set_body(&mut self, body: BodyBytes) {
        self.body = body;
    }

    pub fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn push_header(&mut self, name: String, value: String) {
        self.headers.push((name, value));
    }
}

impl TryFrom<&http::Request<Bytes>> for MockRequest {
    type Error = Error;

    fn try_from(req: &http::Request<Bytes>) -> Result<Self, Self::Error> {
        let mut headers = Vec::with_capacity(req.headers().len());
        for (name, value) in req.headers() {
            let value = value
                .to_str()
                .map_err(|e| Error::Matcher(format!("non-text header {}: {}", name, e)))?;
            headers.push((name.as_str().to_string(), value.to_string()));
        }

        // Since Bytes shares data, clone does not copy the body.
        Ok(MockRequest::new(
            req.method().clone(),
            req.uri().clone(),
            req.version(),
            headers,
            BodyBytes::from(req.body().clone()),
        ))
    }
}
