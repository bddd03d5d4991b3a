extern crate httpmimic;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use httpmimic::{Client, Error, Gock, RoundTrip};

fn get(uri: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

/// The whole global surface in one test function: the free functions share
/// one process-wide instance, so spreading them over parallel test functions
/// would interfere.
#[tokio::test]
async fn global_facade_test() {
    let _ = env_logger::try_init();

    // Declaring a mock enables interception.
    assert!(!httpmimic::intercepting());
    let mock = httpmimic::mock("http://foo.com")
        .get("/bar")
        .reply(201)
        .body_str("global")
        .register();
    assert!(httpmimic::intercepting());
    assert!(httpmimic::exists(&mock));
    assert_eq!(httpmimic::get_all().len(), 1);
    assert!(httpmimic::is_pending());
    assert!(!httpmimic::is_done());

    let res = httpmimic::transport()
        .round_trip(get("http://foo.com/bar"))
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(res.body().as_ref(), b"global");
    assert!(httpmimic::is_done());

    // Unmatched traffic is tracked on the same instance.
    let err = httpmimic::transport()
        .round_trip(get("http://server.com/unmatched"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CannotMatch));
    assert!(httpmimic::has_unmatched_request());
    assert_eq!(httpmimic::unmatched_requests()[0].host(), "server.com");

    // off() flushes and disables; off_all() also clears the unmatched log.
    httpmimic::mock("http://foo.com").reply(200).register();
    httpmimic::off_all();
    assert!(!httpmimic::intercepting());
    assert!(httpmimic::get_all().is_empty());
    assert!(!httpmimic::has_unmatched_request());
    assert!(httpmimic::global().is_done());
}

#[tokio::test]
async fn intercept_client_and_restore_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com")
        .get("/bar")
        .reply(200)
        .body_str("mocked")
        .register();

    let client = Client::new();
    gock.intercept_client(&client);
    // Intercepting twice keeps the original transport recoverable.
    gock.intercept_client(&client);

    let res = client.send(get("http://foo.com/bar")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.body().as_ref(), b"mocked");

    // After restoring, requests bypass the registry. The restored transport
    // here is the real network client, so point it at an unroutable address
    // and expect a network error rather than CannotMatch.
    gock.restore_client(&client);
    gock.mock("http://foo.com").get("/bar").reply(200).register();
    let err = client.send(get("http://127.0.0.1:9/bar")).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));
}

#[tokio::test]
async fn preconfigured_client_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com").reply(204).register();

    let client = gock.client();
    let res = client.send(get("http://foo.com")).await.unwrap();
    assert_eq!(res.status(), 204);
}

#[tokio::test]
async fn observer_sees_every_intercepted_request_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com").get("/bar").reply(200).register();

    let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    gock.observe(move |req, mock| {
        sink.lock()
            .unwrap()
            .push((req.path().to_string(), mock.is_some()));
    });

    let transport = gock.transport();
    let _ = transport.round_trip(get("http://foo.com/bar")).await;
    let _ = transport.round_trip(get("http://foo.com/other")).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[
        ("/bar".to_string(), true),
        ("/other".to_string(), false),
    ]);
}

#[tokio::test]
async fn custom_matcher_extends_mock_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    let mock = gock.mock("http://foo.com").get("/bar").times(2).reply(200).register();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    mock.add_matcher(Arc::new(move |req, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(req.header("x-allowed").first().map(String::as_str) == Some("yes"))
    }));

    let transport = gock.transport();

    let mut allowed = get("http://foo.com/bar");
    allowed.headers_mut().insert(
        "x-allowed",
        http::HeaderValue::from_static("yes"),
    );
    assert_eq!(transport.round_trip(allowed).await.unwrap().status(), 200);

    let err = transport.round_trip(get("http://foo.com/bar")).await.unwrap_err();
    assert!(matches!(err, Error::CannotMatch));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn blocking_send_works_without_runtime_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com").reply(200).body_str("sync").register();

    let client = gock.client();
    // Runs on a plain thread, no runtime in scope.
    let handle = std::thread::spawn(move || client.send_blocking(get("http://foo.com")));
    let res = handle.join().unwrap().unwrap();
    assert_eq!(res.body().as_ref(), b"sync");
}
