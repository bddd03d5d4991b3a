use std::sync::{Arc, RwLock};

use assert_json_diff::{assert_json_matches_no_panic, CompareMode, Config};
use bytes::Bytes;
use regex::Regex;
use serde_json::Value;

use crate::api::Expectation;
use crate::common::data::{Error, MockRequest};
use crate::matchers::{decoders, MatchFn, MatchSettings};

/// Builds the body matcher over the given settings handle. Settings are read
/// at match time, so changing them affects already registered mocks.
pub(crate) fn body_matcher(settings: Arc<RwLock<MatchSettings>>) -> MatchFn {
    Arc::new(move |req, expectation| {
        let settings = settings.read().unwrap().clone();
        match_body(req, expectation, &settings)
    })
}

pub(crate) fn match_body(
    req: &MockRequest,
    expectation: &Expectation,
    settings: &MatchSettings,
) -> Result<bool, Error> {
    let expected = match expectation.body_ref() {
        Some(body) if !body.is_empty() => body,
        _ => return Ok(true),
    };

    let content_type = req.content_type();
    if let Some(ct) = &content_type {
        if !ct.is_empty() && !settings.body_types.iter().any(|t| t == ct) {
            return Ok(false);
        }
    }

    let actual = match req.content_encoding() {
        Some(encoding) if settings.compression_schemes.iter().any(|s| s == &encoding) => {
            if expectation.compression_ref() != Some(encoding.as_str()) {
                return Ok(false);
            }
            Bytes::from(decoders::decompress(&encoding, req.body().as_ref())?)
        }
        _ => {
            // A declared compression scheme the request does not carry is a
            // mismatch, not an error.
            if expectation.compression_ref().is_some() {
                return Ok(false);
            }
            req.body().to_bytes()
        }
    };

    bodies_match(expected.as_ref(), &actual, content_type.as_deref())
}

/// The ordered body comparison strategies: JSON equivalence, URL-encoded-form
/// equivalence, expectation-as-regex, literal containment.
fn bodies_match(expected: &[u8], actual: &[u8], content_type: Option<&str>) -> Result<bool, Error> {
    // 1. JSON equivalence: when both sides parse, canonical value equality
    //    decides (key order and whitespace independent).
    if let (Ok(expected_json), Ok(actual_json)) = (
        serde_json::from_slice::<Value>(expected),
        serde_json::from_slice::<Value>(actual),
    ) {
        let config = Config::new(CompareMode::Strict);
        return Ok(assert_json_matches_no_panic(&actual_json, &expected_json, config).is_ok());
    }

    // 2. URL-encoded-form equivalence: compare as multimaps.
    if content_type == Some("application/x-www-form-urlencoded")
        && form_multimap(expected) == form_multimap(actual)
    {
        return Ok(true);
    }

    // 3. Expectation body as a regex over the request body. Literal bodies
    //    that are not valid regexes simply fall through.
    if let (Ok(pattern), Ok(actual_str)) =
        (std::str::from_utf8(expected), std::str::from_utf8(actual))
    {
        if let Ok(re) = Regex::new(pattern) {
            if re.is_match(actual_str) {
                return Ok(true);
            }
        }
    }

    // 4. Literal containment (covers equality).
    Ok(contains(actual, expected))
}

fn form_multimap(raw: &[u8]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(raw)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    pairs
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
