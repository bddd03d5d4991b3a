use std::io::Read;

use bytes::Bytes;
use futures_timer::Delay;
use futures_util::future::{select, Either};
use futures_util::pin_mut;
use http::header::CONTENT_LENGTH;
use http::{HeaderName, HeaderValue, Response, StatusCode, Version};

use crate::api::ResponseTemplate;
use crate::common::cancel::CancelToken;
use crate::common::data::Error;

/// Synthesizes the final response from a template, optionally decorating a
/// real-network response. Runs outside the interceptor's critical section so
/// a configured delay never serializes other requests.
pub(crate) async fn respond(
    cancel: Option<CancelToken>,
    template: &ResponseTemplate,
    real: Option<Response<Bytes>>,
) -> Result<Response<Bytes>, Error> {
    if let Some(err) = &template.error {
        return Err(err.clone());
    }

    let mut res = match real {
        Some(res) => res,
        None => base_response(),
    };

    for filter in &template.filters {
        if !filter(&res) {
            return Ok(res);
        }
    }

    if let Some(status) = template.status {
        *res.status_mut() = status;
    }

    for (name, value) in &template.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Response(format!("invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Response(format!("invalid header value: {}", e)))?;
        res.headers_mut().append(name, value);
    }

    // Producer wins when both a producer and a buffer are present; a
    // generated body reports an unknown length.
    if let Some(producer) = &template.body_producer {
        let mut body = Vec::new();
        producer()
            .read_to_end(&mut body)
            .map_err(|e| Error::Io(format!("cannot read generated body: {}", e)))?;
        *res.body_mut() = Bytes::from(body);
        res.headers_mut().remove(CONTENT_LENGTH);
    } else if let Some(body) = &template.body {
        res.headers_mut().insert(
            CONTENT_LENGTH,
            HeaderValue::from_str(&body.len().to_string())
                .map_err(|e| Error::Response(e.to_string()))?,
        );
        *res.body_mut() = body.to_bytes();
    }

    for mapper in &template.mappers {
        res = mapper(res);
    }

    if let Some(delay) = template.delay {
        match &cancel {
            Some(token) => {
                let timer = Delay::new(delay);
                let cancelled = token.cancelled();
                pin_mut!(timer);
                pin_mut!(cancelled);
                if let Either::Right(_) = select(timer, cancelled).await {
                    return Err(Error::Canceled);
                }
            }
            None => Delay::new(delay).await,
        }
    }

    // A cancellation that raced the synthesis above still wins.
    if cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
        return Err(Error::Canceled);
    }

    Ok(res)
}

fn base_response() -> Response<Bytes> {
    let mut res = Response::new(Bytes::new());
    *res.status_mut() = StatusCode::OK;
    *res.version_mut() = Version::HTTP_11;
    res
}
