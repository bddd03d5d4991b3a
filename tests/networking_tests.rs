extern crate httpmimic;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use httpmimic::{Error, Gock, RoundTrip};

fn get(uri: &str) -> Request<Bytes> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

/// Stands in for the real network: answers every request with 299 and counts
/// the calls.
struct FakeNetwork {
    calls: AtomicUsize,
}

impl FakeNetwork {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoundTrip for FakeNetwork {
    async fn round_trip(&self, _req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut res = Response::new(Bytes::from_static(b"from the network"));
        *res.status_mut() = http::StatusCode::from_u16(299).unwrap();
        res.headers_mut()
            .insert("x-upstream", http::HeaderValue::from_static("real"));
        Ok(res)
    }
}

/// With networking enabled and no mock matching, the real response is
/// returned as-is.
#[tokio::test]
async fn unmatched_request_passes_through_test() {
    // Arrange
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.intercept();
    gock.enable_networking();

    let upstream = FakeNetwork::new();
    let transport = gock.transport_with(upstream.clone());

    // Act
    let res = transport.round_trip(get("http://foo.com/anything")).await.unwrap();

    // Assert
    assert_eq!(res.status(), 299);
    assert_eq!(res.body().as_ref(), b"from the network");
    assert_eq!(upstream.calls(), 1);
    // Passed-through requests are not unmatched failures.
    assert!(!gock.has_unmatched_request());
}

/// Networking filters veto passthrough per request.
#[tokio::test]
async fn networking_filter_vetoes_passthrough_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.intercept();
    gock.enable_networking();
    gock.networking_filter(|req| req.path() != "/blocked");

    let upstream = FakeNetwork::new();
    let transport = gock.transport_with(upstream.clone());

    let err = transport.round_trip(get("http://foo.com/blocked")).await.unwrap_err();
    assert!(matches!(err, Error::CannotMatch));
    assert_eq!(upstream.calls(), 0);
    assert!(gock.has_unmatched_request());

    let res = transport.round_trip(get("http://foo.com/open")).await.unwrap();
    assert_eq!(res.status(), 299);
    assert_eq!(upstream.calls(), 1);

    gock.disable_networking_filters();
    let res = transport.round_trip(get("http://foo.com/blocked")).await.unwrap();
    assert_eq!(res.status(), 299);
}

/// A mock with `enable_networking` decorates the real response instead of
/// fabricating one.
#[tokio::test]
async fn mock_decorates_real_response_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com")
        .get("/bar")
        .enable_networking()
        .reply(201)
        .add_header("x-mock", "decorated")
        .register();

    let upstream = FakeNetwork::new();
    let transport = gock.transport_with(upstream.clone());

    let res = transport.round_trip(get("http://foo.com/bar")).await.unwrap();
    // Status and headers come from the template, the upstream headers and
    // body survive.
    assert_eq!(res.status(), 201);
    assert_eq!(res.headers()["x-upstream"], "real");
    assert_eq!(res.headers()["x-mock"], "decorated");
    assert_eq!(res.body().as_ref(), b"from the network");
    assert_eq!(upstream.calls(), 1);
}

/// While interception is disabled the transport is a pure passthrough: no
/// matching, no cleaning, no unmatched tracking.
#[tokio::test]
async fn disabled_interception_is_pure_passthrough_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com").get("/bar").reply(500).register();
    gock.disable();

    let upstream = FakeNetwork::new();
    let transport = gock.transport_with(upstream.clone());

    let res = transport.round_trip(get("http://foo.com/bar")).await.unwrap();
    assert_eq!(res.status(), 299);
    assert_eq!(upstream.calls(), 1);
    // The mock is still registered and untouched.
    assert_eq!(gock.get_all().len(), 1);
    assert!(!gock.has_unmatched_request());
}

/// An upstream failure during passthrough surfaces as a network error.
struct BrokenNetwork;

#[async_trait]
impl RoundTrip for BrokenNetwork {
    async fn round_trip(&self, _req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        Err(Error::Network("connection refused".to_string()))
    }
}

#[tokio::test]
async fn upstream_error_surfaces_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.intercept();
    gock.enable_networking();

    let transport = gock.transport_with(Arc::new(BrokenNetwork));
    let err = transport.round_trip(get("http://foo.com")).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));
}
