use std::{
    future::Future,
    sync::Arc,
    task::{Context, Poll, Waker},
};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use crossbeam_utils::sync::{Parker, Unparker};
use futures_util::task::ArcWake;

// ===============================================================================================
// Futures
// ===============================================================================================

/// Extension trait for blocking the current thread on a future.
///
/// This allows the synchronous convenience methods of this crate (such as
/// [`Client::send_blocking`](crate::Client::send_blocking)) to drive the
/// asynchronous core without requiring the caller to own a runtime. Note that
/// real-network passthrough still needs an ambient Tokio runtime, because the
/// underlying connector does.
pub trait Join: Future {
    fn join(self) -> <Self as Future>::Output;
}

impl<F: Future> Join for F {
    fn join(self) -> <Self as Future>::Output {
        let parker = Parker::new();
        let waker = unpark_on_wake(parker.unparker().clone());
        let mut cx = Context::from_waker(&waker);

        let mut pinned = Box::pin(self);
        loop {
            if let Poll::Ready(output) = pinned.as_mut().poll(&mut cx) {
                return output;
            }
            // Pending: sleep until the waker fires, then poll again.
            parker.park();
        }
    }
}

/// A waker that unparks the polling thread.
fn unpark_on_wake(unparker: Unparker) -> Waker {
    struct Unpark(Unparker);

    impl ArcWake for Unpark {
        fn wake_by_ref(this: &Arc<Self>) {
            this.0.unpark();
        }
    }

    futures_util::task::waker(Arc::new(Unpark(unparker)))
}

// ===============================================================================================
// Body bytes
// ===============================================================================================

/// A wrapper around `bytes::Bytes` with the helpers body matching needs.
///
/// Cloning is cheap: the underlying buffer is shared, never copied.
#[derive(Debug, Clone, Default)]
pub struct BodyBytes(pub(crate) Bytes);

impl BodyBytes {
    /// Copies the bytes into a `Vec<u8>`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Cheaply clones the underlying shared buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the buffer contains `slice` as a contiguous
    /// subsequence. An empty `slice` is contained in every buffer.
    pub fn contains_slice(&self, slice: &[u8]) -> bool {
        if slice.is_empty() {
            return true;
        }
        if slice.len() > self.0.len() {
            return false;
        }
        self.0
            .as_ref()
            .windows(slice.len())
            .any(|window| window == slice)
    }

    pub fn contains_str(&self, substring: &str) -> bool {
        self.contains_slice(substring.as_bytes())
    }

    /// Converts the bytes to a UTF-8 string without copying when the input is
    /// valid UTF-8; invalid sequences are replaced lossily otherwise.
    pub fn to_maybe_lossy_str(&self) -> std::borrow::Cow<str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<Bytes> for BodyBytes {
    fn from(value: Bytes) -> Self {
        BodyBytes(value)
    }
}

impl From<Vec<u8>> for BodyBytes {
    fn from(value: Vec<u8>) -> Self {
        BodyBytes(Bytes::from(value))
    }
}

impl From<String> for BodyBytes {
    fn from(value: String) -> Self {
        BodyBytes(Bytes::from(value))
    }
}

impl From<&str> for BodyBytes {
    fn from(value: &str) -> Self {
        BodyBytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl AsRef<[u8]> for BodyBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl PartialEq for BodyBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::fmt::Display for BodyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(result) => write!(f, "{}", result),
            Err(_) => write!(f, "{}", BASE64.encode(&self.0)),
        }
    }
}
