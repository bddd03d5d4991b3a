use std::sync::{Arc, RwLock};

use crate::api::Expectation;
use crate::common::data::{Error, MockRequest};

pub(crate) mod body;
pub mod builtins;
pub(crate) mod decoders;

/// A single matcher predicate: does `req` satisfy the expectation?
///
/// Returning an error aborts the whole match loop; the error is surfaced to
/// the HTTP caller.
pub type MatchFn = Arc<dyn Fn(&MockRequest, &Expectation) -> Result<bool, Error> + Send + Sync>;

/// Tunables consulted by the body matcher and by
/// [`Expectation::match_type`](crate::Expectation::match_type).
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Text-based MIME types whose bodies are compared. A request with any
    /// other declared `Content-Type` never body-matches.
    pub body_types: Vec<String>,
    /// Shorthand aliases accepted by `match_type`.
    pub body_type_aliases: Vec<(String, String)>,
    /// `Content-Encoding` values the body matcher can transparently decode.
    pub compression_schemes: Vec<String>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            body_types: vec![
                "text/html".to_string(),
                "text/plain".to_string(),
                "application/json".to_string(),
                "application/xml".to_string(),
                "multipart/form-data".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ],
            body_type_aliases: vec![
                ("html".to_string(), "text/html".to_string()),
                ("text".to_string(), "text/plain".to_string()),
                ("json".to_string(), "application/json".to_string()),
                ("xml".to_string(), "application/xml".to_string()),
                ("form".to_string(), "multipart/form-data".to_string()),
                ("url".to_string(), "application/x-www-form-urlencoded".to_string()),
            ],
            compression_schemes: vec!["gzip".to_string()],
        }
    }
}

impl MatchSettings {
    /// Resolves a `match_type` alias to its MIME type; unknown aliases pass
    /// through verbatim.
    pub fn resolve_alias(&self, type_or_alias: &str) -> String {
        self.body_type_aliases
            .iter()
            .find(|(alias, _)| alias == type_or_alias)
            .map(|(_, mime)| mime.clone())
            .unwrap_or_else(|| type_or_alias.to_string())
    }
}

/// An ordered list of predicates. Evaluation stops at the first predicate
/// returning false or an error.
///
/// The built-in chain evaluates, in order: method, scheme, host, path,
/// headers, query parameters, path parameters, body. The first seven form the
/// header group; [`header_only`](MatcherChain::header_only) builds a chain
/// without the body matcher.
#[derive(Clone, Default)]
pub struct MatcherChain {
    matchers: Vec<MatchFn>,
}

impl MatcherChain {
    /// A chain with no predicates; it matches every request.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The full default chain: header group plus the body matcher, which
    /// consults the given settings at match time.
    pub fn full(settings: &Arc<RwLock<MatchSettings>>) -> Self {
        let mut chain = Self::header_only();
        chain.add(body::body_matcher(settings.clone()));
        chain
    }

    /// The seven header-group matchers, without body matching.
    pub fn header_only() -> Self {
        let mut chain = Self::empty();
        chain.add(Arc::new(builtins::match_method));
        chain.add(Arc::new(builtins::match_scheme));
        chain.add(Arc::new(builtins::match_host));
        chain.add(Arc::new(builtins::match_path));
        chain.add(Arc::new(builtins::match_headers));
        chain.add(Arc::new(builtins::match_query_params));
        chain.add(Arc::new(builtins::match_path_params));
        chain
    }

    /// A full chain over private default settings, for mocks built without a
    /// live `Gock` instance.
    pub(crate) fn detached_default() -> Self {
        Self::full(&Arc::new(RwLock::new(MatchSettings::default())))
    }

    pub fn get(&self) -> &[MatchFn] {
        &self.matchers
    }

    pub fn add(&mut self, f: MatchFn) {
        self.matchers.push(f);
    }

    pub fn set(&mut self, matchers: Vec<MatchFn>) {
        self.matchers = matchers;
    }

    pub fn flush(&mut self) {
        self.matchers.clear();
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Runs the chain in order; the first false or error terminates with that
    /// outcome.
    pub fn matches(&self, req: &MockRequest, expectation: &Expectation) -> Result<bool, Error> {
        for matcher in &self.matchers {
            if !matcher(req, expectation)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
