use regex::Regex;

use crate::api::Expectation;
use crate::common::data::{Error, MockRequest};

/// Case-sensitive method equality; an expectation without a method matches
/// any.
pub fn match_method(req: &MockRequest, expectation: &Expectation) -> Result<bool, Error> {
    Ok(match expectation.method_ref() {
        Some(method) => req.method() == method,
        None => true,
    })
}

/// Scheme equality; an expectation without a URL matches any.
pub fn match_scheme(req: &MockRequest, expectation: &Expectation) -> Result<bool, Error> {
    Ok(match expectation.url_ref() {
        Some(url) => url.scheme().is_empty() || url.scheme() == req.scheme(),
        None => true,
    })
}

/// Full-string regex match of the request host (including an explicit
/// non-default port) against the expectation host pattern.
pub fn match_host(req: &MockRequest, expectation: &Expectation) -> Result<bool, Error> {
    let pattern = match expectation.host_pattern() {
        Some(pattern) => pattern,
        None => return Ok(true),
    };
    let re = Regex::new(&format!("^(?:{})$", pattern))?;
    Ok(re.is_match(&req.host()))
}

/// Full-string regex match of the request path against the expectation path,
/// so a literal `/bar` does not substring-match `/foo/bar/baz`. Declared
/// path-parameter placeholders (`{id}`) count as single-segment wildcards
/// here; their patterns are enforced by [`match_path_params`]. Two paths that
/// are equal after trimming a single trailing slash on either side also
/// match. A mock declared without a path (the URL parser normalizes that to
/// `/`) accepts any path.
pub fn match_path(req: &MockRequest, expectation: &Expectation) -> Result<bool, Error> {
    let path = match expectation.url_ref() {
        Some(url) => template_path(url),
        None => return Ok(true),
    };
    let path = path.as_str();
    if path.is_empty() || path == "/" {
        return Ok(true);
    }

    let mut pattern = path.to_string();
    for (name, _) in expectation.path_param_patterns() {
        pattern = pattern.replace(&format!("{{{}}}", name), "[^/]+");
    }

    if Regex::new(&format!("^(?:{})$", pattern))?.is_match(req.path()) {
        return Ok(true);
    }
    Ok(trim_slash(path) == trim_slash(req.path()))
}

fn trim_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

// The url crate percent-encodes braces in paths; path templates use them
// literally.
fn template_path(url: &url::Url) -> String {
    url.path().replace("%7B", "{").replace("%7D", "}")
}

/// For each expectation header, the request must carry at least one value for
/// that name (case-insensitive) matching the pattern.
pub fn match_headers(req: &MockRequest, expectation: &Expectation) -> Result<bool, Error> {
    for (name, pattern) in expectation.header_patterns() {
        let re = Regex::new(pattern)?;
        if !req.header(name).iter().any(|value| re.is_match(value)) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Same contract as headers, over decoded query parameters. Patterns come
/// from `match_param` declarations and from the expectation URL's own query
/// string.
pub fn match_query_params(req: &MockRequest, expectation: &Expectation) -> Result<bool, Error> {
    let request_params = req.query_params();

    let url_params: Vec<(String, String)> = match expectation.url_ref() {
        Some(url) => url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => Vec::new(),
    };

    for (name, pattern) in expectation.param_patterns().iter().chain(url_params.iter()) {
        let re = Regex::new(pattern)?;
        let found = request_params
            .iter()
            .filter(|(k, _)| k == name)
            .any(|(_, v)| re.is_match(v));
        if !found {
            return Ok(false);
        }
    }
    Ok(true)
}

/// For each declared path parameter `k`, the expectation path must contain a
/// `{k}` segment and the request segment in the same position must match the
/// pattern. Alignment is by position after splitting on `/`.
pub fn match_path_params(req: &MockRequest, expectation: &Expectation) -> Result<bool, Error> {
    let params = expectation.path_param_patterns();
    if params.is_empty() {
        return Ok(true);
    }

    let template = match expectation.url_ref() {
        Some(url) => template_path(url),
        None => return Ok(false),
    };
    let template_segments: Vec<&str> = template.split('/').collect();
    let request_segments: Vec<&str> = req.path().split('/').collect();

    for (name, pattern) in params {
        let placeholder = format!("{{{}}}", name);
        let position = match template_segments.iter().position(|s| *s == placeholder) {
            Some(position) => position,
            None => return Ok(false),
        };
        let actual = match request_segments.get(position) {
            Some(actual) => *actual,
            None => return Ok(false),
        };
        if !Regex::new(pattern)?.is_match(actual) {
            return Ok(false);
        }
    }
    Ok(true)
}
