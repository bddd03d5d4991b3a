use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Notify;

/// Cooperative cancellation handle for an in-flight request.
///
/// The host HTTP machinery has no uniform cancellation signal, so callers that
/// want a mocked delay to be interruptible attach a token to the request's
/// extensions before sending it:
///
/// ```
/// use httpmimic::CancelToken;
///
/// let token = CancelToken::new();
/// let mut req = http::Request::builder()
///     .uri("http://foo.com")
///     .body(bytes::Bytes::new())
///     .unwrap();
/// req.extensions_mut().insert(token.clone());
/// // ... hand `req` to the client, later: token.cancel();
/// ```
///
/// The responder observes the token while waiting out a configured delay and
/// once more before returning, yielding [`Error::Canceled`](crate::Error::Canceled)
/// when it fires.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the request. Idempotent; wakes every task currently waiting in
    /// [`cancelled`](Self::cancelled).
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token has been cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag so a concurrent
            // cancel() between the check and the await cannot be missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
