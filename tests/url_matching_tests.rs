extern crate httpmimic;

use bytes::Bytes;
use httpmimic::{Error, Gock, RoundTrip};

fn get(uri: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

#[tokio::test]
async fn match_exact_url_test() {
    // Arrange
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com")
        .get("/bar")
        .reply(200)
        .body_str("foo foo")
        .register();

    // Act
    let res = gock.transport().round_trip(get("http://foo.com/bar")).await.unwrap();

    // Assert
    assert_eq!(res.status(), 200);
    assert_eq!(res.body().as_ref(), b"foo foo");
}

#[tokio::test]
async fn wrong_host_is_unmatched_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com").get("/bar").reply(200).register();

    let err = gock
        .transport()
        .round_trip(get("http://bar.com/bar"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CannotMatch));
}

#[tokio::test]
async fn wrong_scheme_is_unmatched_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("https://foo.com").get("/bar").reply(200).register();

    let err = gock
        .transport()
        .round_trip(get("http://foo.com/bar"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CannotMatch));
}

#[tokio::test]
async fn host_with_explicit_port_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://127.0.0.1:1234").get("/bar").reply(200).register();

    let res = gock
        .transport()
        .round_trip(get("http://127.0.0.1:1234/bar"))
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn path_regex_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com")
        .get("/orders/[0-9]+/items")
        .reply(200)
        .register();

    let res = gock
        .transport()
        .round_trip(get("http://foo.com/orders/42/items"))
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn trailing_slash_is_tolerated_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com").get("/bar/").times(2).reply(200).register();

    let res = gock.transport().round_trip(get("http://foo.com/bar")).await.unwrap();
    assert_eq!(res.status(), 200);
    let res = gock.transport().round_trip(get("http://foo.com/bar/")).await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn query_param_matching_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com")
        .get("/search")
        .match_param("q", "^gock$")
        .param_present("page")
        .reply(200)
        .register();

    let res = gock
        .transport()
        .round_trip(get("http://foo.com/search?q=gock&page=2"))
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    // Missing "page" parameter.
    gock.mock("http://foo.com")
        .get("/search")
        .match_param("q", "^gock$")
        .param_present("page")
        .reply(200)
        .register();
    let err = gock
        .transport()
        .round_trip(get("http://foo.com/search?q=gock"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CannotMatch));
}

#[tokio::test]
async fn query_in_mock_url_must_be_present_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com/search?lang=en").times(2).reply(200).register();

    let res = gock
        .transport()
        .round_trip(get("http://foo.com/search?lang=en&extra=1"))
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let err = gock
        .transport()
        .round_trip(get("http://foo.com/search"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CannotMatch));
}

#[tokio::test]
async fn path_param_matching_test() {
    let _ = env_logger::try_init();
    let gock = Gock::new();
    gock.mock("http://foo.com")
        .get("/users/{id}/posts")
        .path_param("id", "^[0-9]+$")
        .reply(200)
        .register();

    let res = gock
        .transport()
        .round_trip(get("http://foo.com/users/42/posts"))
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    gock.mock("http://foo.com")
        .get("/users/{id}/posts")
        .path_param("id", "^[0-9]+$")
        .reply(200)
        .register();
    let err = gock
        .transport()
        .round_trip(get("http://foo.com/users/bob/posts"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CannotMatch));
}
