use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, RwLock,
};

use tracing::debug;

use crate::api::expectation::Expectation;
use crate::api::response::ResponseTemplate;
use crate::common::data::{Error, MockRequest};
use crate::matchers::{MatchFn, MatcherChain};

/// One registered mock: an [`Expectation`], a [`ResponseTemplate`], a matcher
/// chain and the lifecycle state (trigger counter, disabled flag).
///
/// `Mock` is a cheap handle over shared state; clones refer to the same mock.
/// Identity (for [`Gock::exists`](crate::Gock::exists) and
/// [`Gock::remove`](crate::Gock::remove)) is pointer identity, not structural
/// equality.
#[derive(Clone)]
pub struct Mock {
    state: Arc<MockState>,
}

pub(crate) struct MockState {
    expectation: Expectation,
    response: ResponseTemplate,
    matcher: RwLock<MatcherChain>,
    counter: AtomicUsize,
    disabled: AtomicBool,
}

impl Mock {
    pub(crate) fn new(
        expectation: Expectation,
        response: ResponseTemplate,
        matcher: MatcherChain,
    ) -> Self {
        let counter = AtomicUsize::new(expectation.times);
        Self {
            state: Arc::new(MockState {
                expectation,
                response,
                matcher: RwLock::new(matcher),
                counter,
                disabled: AtomicBool::new(false),
            }),
        }
    }

    /// Evaluates this mock against the request: expectation filters first,
    /// then mappers over a copy of the request, then the matcher chain. On
    /// success the trigger counter is decremented unless the mock is
    /// persisted. A done mock never matches.
    pub fn matches(&self, req: &MockRequest) -> Result<bool, Error> {
        if self.done() {
            return Ok(false);
        }

        let expectation = &self.state.expectation;

        for filter in &expectation.filters {
            if !filter(req) {
                return Ok(false);
            }
        }

        // Mappers rewrite a copy; the transport keeps forwarding the
        // original request bytes.
        let mapped;
        let req = if expectation.mappers.is_empty() {
            req
        } else {
            let mut rewritten = req.clone();
            for mapper in &expectation.mappers {
                rewritten = mapper(rewritten);
            }
            mapped = rewritten;
            &mapped
        };

        let matched = self.state.matcher.read().unwrap().matches(req, expectation)?;
        if matched && !expectation.persist {
            let _ = self
                .state
                .counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                    Some(c.saturating_sub(1))
                });
            debug!(
                remaining = self.counter(),
                "mock matched {} {}",
                req.method(),
                req.uri()
            );
        }
        Ok(matched)
    }

    /// True when the mock is disabled, or non-persisted with an exhausted
    /// counter. Done mocks are removed by [`Gock::clean`](crate::Gock::clean).
    pub fn done(&self) -> bool {
        self.state.disabled.load(Ordering::SeqCst)
            || (!self.state.expectation.persist && self.counter() == 0)
    }

    /// Disables the mock; a disabled mock never matches again.
    pub fn disable(&self) {
        self.state.disabled.store(true, Ordering::SeqCst);
    }

    pub fn is_disabled(&self) -> bool {
        self.state.disabled.load(Ordering::SeqCst)
    }

    /// Remaining trigger count. Meaningless for persisted mocks.
    pub fn counter(&self) -> usize {
        self.state.counter.load(Ordering::SeqCst)
    }

    /// Replaces the matcher chain.
    pub fn set_matcher(&self, matcher: MatcherChain) {
        *self.state.matcher.write().unwrap() = matcher;
    }

    /// Appends a predicate to the matcher chain.
    pub fn add_matcher(&self, f: MatchFn) {
        self.state.matcher.write().unwrap().add(f);
    }

    /// A snapshot of the current matcher chain.
    pub fn matcher(&self) -> MatcherChain {
        self.state.matcher.read().unwrap().clone()
    }

    pub fn expectation(&self) -> &Expectation {
        &self.state.expectation
    }

    pub fn response(&self) -> &ResponseTemplate {
        &self.state.response
    }

    pub(crate) fn ptr_eq(&self, other: &Mock) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::Bytes;
    use std::sync::Weak;

    fn request(method: http::Method, uri: &str) -> MockRequest {
        let req = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap();
        MockRequest::try_from(&req).unwrap()
    }

    fn mock_for(uri: &str) -> Mock {
        let exp = Expectation::new(Weak::new()).url(uri);
        Mock::new(
            exp,
            ResponseTemplate::from_expectation(Expectation::new(Weak::new())),
            MatcherChain::detached_default(),
        )
    }

    #[test]
    fn counter_reaches_zero_and_mock_is_done_test() {
        let mock = mock_for("http://foo.com/bar");
        let req = request(http::Method::GET, "http://foo.com/bar");

        assert!(mock.matches(&req).unwrap());
        assert_eq!(mock.counter(), 0);
        assert!(mock.done());
        // Exhausted mocks never match again, even before clean() runs.
        assert!(!mock.matches(&req).unwrap());
    }

    #[test]
    fn persisted_mock_keeps_matching_test() {
        let exp = Expectation::new(Weak::new()).url("http://foo.com").persist();
        let mock = Mock::new(
            exp,
            ResponseTemplate::from_expectation(Expectation::new(Weak::new())),
            MatcherChain::detached_default(),
        );
        let req = request(http::Method::GET, "http://foo.com/");
        for _ in 0..5 {
            assert!(mock.matches(&req).unwrap());
        }
        assert!(!mock.done());
    }

    #[test]
    fn disabled_mock_never_matches_test() {
        let mock = mock_for("http://foo.com");
        mock.disable();
        let req = request(http::Method::GET, "http://foo.com/");
        assert!(!mock.matches(&req).unwrap());
        assert!(mock.done());
    }

    #[test]
    fn filter_short_circuits_matching_test() {
        let exp = Expectation::new(Weak::new())
            .url("http://foo.com")
            .filter(|_| false);
        let mock = Mock::new(
            exp,
            ResponseTemplate::from_expectation(Expectation::new(Weak::new())),
            MatcherChain::detached_default(),
        );
        let req = request(http::Method::GET, "http://foo.com/");
        assert!(!mock.matches(&req).unwrap());
        // The counter is untouched when a filter rejects.
        assert_eq!(mock.counter(), 1);
    }

    #[test]
    fn mapper_rewrites_the_matching_copy_test() {
        let exp = Expectation::new(Weak::new())
            .url("http://foo.com")
            .get("/rewritten")
            .map(|mut req| {
                req.set_uri("http://foo.com/rewritten".parse().unwrap());
                req
            });
        let mock = Mock::new(
            exp,
            ResponseTemplate::from_expectation(Expectation::new(Weak::new())),
            MatcherChain::detached_default(),
        );
        let req = request(http::Method::GET, "http://foo.com/original");
        assert!(mock.matches(&req).unwrap());
        // The caller's request is untouched.
        assert_eq!(req.path(), "/original");
    }

    #[test]
    fn custom_matcher_chain_test() {
        let mock = mock_for("http://foo.com");
        let mut chain = MatcherChain::empty();
        chain.add(Arc::new(|req, _| Ok(req.method() == http::Method::DELETE)));
        mock.set_matcher(chain);

        assert!(!mock.matches(&request(http::Method::GET, "http://foo.com/")).unwrap());
        assert!(mock
            .matches(&request(http::Method::DELETE, "http://foo.com/"))
            .unwrap());
    }
}
