use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client as HyperClient},
    rt::TokioExecutor,
};

use crate::common::data::Error;
use crate::common::util::Join;

/// The round-trip seam of this crate: one fully-buffered HTTP exchange.
///
/// [`Transport`](crate::Transport) implements it to intercept traffic;
/// [`NetworkClient`] implements it against the real network. Code under test
/// only ever talks to a `dyn RoundTrip`, which is what makes the swap
/// invisible.
#[async_trait]
pub trait RoundTrip: Send + Sync {
    async fn round_trip(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error>;
}

/// Real-network transport backed by a hyper legacy client.
pub struct NetworkClient {
    client: HyperClient<HttpConnector, Full<Bytes>>,
}

impl NetworkClient {
    pub fn new() -> Self {
        Self {
            client: HyperClient::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }
}

impl Default for NetworkClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoundTrip for NetworkClient {
    async fn round_trip(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        let (parts, body) = req.into_parts();
        let req = Request::from_parts(parts, Full::new(body));

        let res = self
            .client
            .request(req)
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let (parts, body) = res.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .to_bytes();

        Ok(Response::from_parts(parts, body))
    }
}

/// A minimal HTTP client with a swappable transport slot.
///
/// Rust has no process-wide default transport the way some runtimes do, so
/// this type stands in for "the client whose transport gets swapped":
/// [`Gock::intercept_client`](crate::Gock::intercept_client) replaces the slot
/// with an intercepting [`Transport`](crate::Transport) and remembers the
/// original, [`Gock::restore_client`](crate::Gock::restore_client) puts it
/// back.
///
/// Code under test that already speaks `dyn RoundTrip` does not need this
/// type; it can be handed a [`Transport`](crate::Transport) directly.
pub struct Client {
    transport: Mutex<Arc<dyn RoundTrip>>,
    original: Mutex<Option<Arc<dyn RoundTrip>>>,
}

impl Client {
    /// A client over the real network.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(NetworkClient::new()))
    }

    pub fn with_transport(transport: Arc<dyn RoundTrip>) -> Self {
        Self {
            transport: Mutex::new(transport),
            original: Mutex::new(None),
        }
    }

    pub async fn send(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        let transport = self.transport.lock().unwrap().clone();
        transport.round_trip(req).await
    }

    /// Blocking variant of [`send`](Self::send). Mocked traffic needs no
    /// runtime; real-network passthrough requires an ambient Tokio runtime.
    pub fn send_blocking(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        self.send(req).join()
    }

    pub(crate) fn transport(&self) -> Arc<dyn RoundTrip> {
        self.transport.lock().unwrap().clone()
    }

    /// Installs `transport`, saving the current one. No-op when already
    /// intercepted.
    pub(crate) fn install(&self, transport: Arc<dyn RoundTrip>) {
        let mut original = self.original.lock().unwrap();
        if original.is_some() {
            return;
        }
        let mut slot = self.transport.lock().unwrap();
        *original = Some(slot.clone());
        *slot = transport;
    }

    /// Restores the transport saved by [`install`](Self::install). No-op when
    /// not intercepted.
    pub(crate) fn uninstall(&self) {
        if let Some(saved) = self.original.lock().unwrap().take() {
            *self.transport.lock().unwrap() = saved;
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
