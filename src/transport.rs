use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::debug;

use crate::common::cancel::CancelToken;
use crate::common::data::{Error, MockRequest};
use crate::common::http::RoundTrip;
use crate::responder;
use crate::Gock;

/// The interceptor: a [`RoundTrip`] that answers requests from the mock
/// registry instead of the network.
///
/// Obtained from [`Gock::transport`] (wrapping the real network) or
/// [`Gock::transport_with`] (wrapping an arbitrary upstream transport). While
/// interception is disabled the transport is a pure passthrough.
pub struct Transport {
    gock: Gock,
    // Serializes match-and-select, so counted mocks are consumed
    // deterministically under concurrent callers.
    lock: Mutex<()>,
    inner: Option<Arc<dyn RoundTrip>>,
}

impl Transport {
    pub(crate) fn new(gock: Gock, inner: Option<Arc<dyn RoundTrip>>) -> Self {
        Self {
            gock,
            lock: Mutex::new(()),
            inner,
        }
    }

    fn upstream(&self) -> Arc<dyn RoundTrip> {
        match &self.inner {
            Some(inner) => inner.clone(),
            None => self.gock.native_transport(),
        }
    }

    async fn intercept(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        let mock_req = MockRequest::try_from(&req)?;
        let cancel = req.extensions().get::<CancelToken>().cloned();

        let (mock, networking) = {
            let _guard = self.lock.lock().unwrap();

            let mock = self.gock.match_mock(&mock_req)?;
            self.gock.notify_observer(&mock_req, mock.as_ref());

            let networking = self.gock.should_use_network(&mock_req, mock.as_ref());
            (mock, networking)
        };

        // Unmatched-request tracking happens after the matching lock is gone.
        if mock.is_none() && !networking {
            self.gock.track_unmatched(mock_req);
            return Err(Error::CannotMatch);
        }

        let real = if networking {
            debug!("forwarding {} {} to the real network", mock_req.method(), mock_req.uri());
            let res = self.upstream().round_trip(req).await?;
            match &mock {
                // Passthrough without a mock returns the real response as-is.
                None => return Ok(res),
                Some(_) => Some(res),
            }
        } else {
            None
        };

        let mock = mock.expect("an unmatched request without networking was handled above");
        responder::respond(cancel, mock.response(), real).await
    }
}

#[async_trait]
impl RoundTrip for Transport {
    async fn round_trip(&self, req: Request<Bytes>) -> Result<Response<Bytes>, Error> {
        if !self.gock.intercepting() {
            return self.upstream().round_trip(req).await;
        }

        let result = self.intercept(req).await;
        // Mocks whose counter just reached zero are pruned after every
        // intercepted round trip.
        self.gock.clean();
        result
    }
}
