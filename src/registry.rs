use std::sync::{Mutex, RwLock};

use tracing::debug;

use crate::api::Mock;
use crate::common::data::MockRequest;

/// Ordered store of live mocks plus the append-only log of unmatched
/// requests.
///
/// Mocks are matched in registration order; the registry never drops a mock
/// on its own — removal happens only through [`clean`](Registry::clean),
/// [`remove`](Registry::remove), [`flush`](Registry::flush) or not at all.
pub(crate) struct Registry {
    mocks: RwLock<Vec<Mock>>,
    unmatched: Mutex<Vec<MockRequest>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            mocks: RwLock::new(Vec::new()),
            unmatched: Mutex::new(Vec::new()),
        }
    }

    /// Appends the mock unless the same mock (pointer identity) is already
    /// registered.
    pub(crate) fn register(&self, mock: Mock) {
        let mut mocks = self.mocks.write().unwrap();
        if mocks.iter().any(|m| m.ptr_eq(&mock)) {
            return;
        }
        debug!(total = mocks.len() + 1, "mock registered");
        mocks.push(mock);
    }

    /// A snapshot of the registered mocks in registration order.
    pub(crate) fn get_all(&self) -> Vec<Mock> {
        self.mocks.read().unwrap().clone()
    }

    pub(crate) fn exists(&self, mock: &Mock) -> bool {
        self.mocks.read().unwrap().iter().any(|m| m.ptr_eq(mock))
    }

    /// Removes the first occurrence of the mock.
    pub(crate) fn remove(&self, mock: &Mock) {
        let mut mocks = self.mocks.write().unwrap();
        if let Some(position) = mocks.iter().position(|m| m.ptr_eq(mock)) {
            mocks.remove(position);
        }
    }

    pub(crate) fn flush(&self) {
        self.mocks.write().unwrap().clear();
    }

    /// Prunes done mocks (disabled, or counter-exhausted and non-persisted).
    pub(crate) fn clean(&self) {
        let mut mocks = self.mocks.write().unwrap();
        let before = mocks.len();
        mocks.retain(|m| !m.done());
        if mocks.len() != before {
            debug!(removed = before - mocks.len(), "cleaned done mocks");
        }
    }

    /// Prunes done mocks, then returns the survivors still waiting to be
    /// consumed. Persisted mocks are never pending: they cannot be consumed,
    /// so they do not hold `is_done` false.
    pub(crate) fn pending(&self) -> Vec<Mock> {
        self.clean();
        self.get_all()
            .into_iter()
            .filter(|m| !m.expectation().is_persisted())
            .collect()
    }

    pub(crate) fn is_pending(&self) -> bool {
        !self.pending().is_empty()
    }

    pub(crate) fn is_done(&self) -> bool {
        !self.is_pending()
    }

    pub(crate) fn track_unmatched(&self, req: MockRequest) {
        debug!("unmatched request: {} {}", req.method(), req.uri());
        self.unmatched.lock().unwrap().push(req);
    }

    pub(crate) fn unmatched_requests(&self) -> Vec<MockRequest> {
        self.unmatched.lock().unwrap().clone()
    }

    pub(crate) fn has_unmatched_request(&self) -> bool {
        !self.unmatched.lock().unwrap().is_empty()
    }

    pub(crate) fn clean_unmatched(&self) {
        self.unmatched.lock().unwrap().clear();
    }
}
