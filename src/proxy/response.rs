//! Shared HTTP response helpers for denied/rejected/error responses

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::header::{CONNECTION, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use crate::filter::Denial;

pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

const NON_PROXY_BODY: &str = "This is a proxy server. Does not respond to non-proxy requests.\n";

fn full(body: impl Into<Bytes>) -> ProxyBody {
    Full::new(body.into()).map_err(|e| match e {}).boxed()
}

pub(crate) fn empty() -> ProxyBody {
    Empty::<Bytes>::new().map_err(|e| match e {}).boxed()
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ProxyBody> {
    let mut resp = Response::new(full(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, hyper::header::HeaderValue::from_static("text/plain"));
    resp
}

/// Render a whitelist denial exactly as decided.
pub fn denied_response(denial: &Denial) -> Response<ProxyBody> {
    let mut resp = Response::new(full(denial.body));
    *resp.status_mut() = denial.status;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(denial.content_type),
    );
    resp
}

/// Answer to a rejected CONNECT: 502 and close the client connection.
pub fn connect_rejected_response() -> Response<ProxyBody> {
    let mut resp = Response::new(empty());
    *resp.status_mut() = StatusCode::BAD_GATEWAY;
    resp.headers_mut()
        .insert(CONNECTION, hyper::header::HeaderValue::from_static("close"));
    resp
}

/// Answer to an allowed CONNECT once the upstream is dialed.
pub fn connect_established_response() -> Response<ProxyBody> {
    Response::new(empty())
}

/// Answer to an origin-form request sent straight at the proxy.
pub fn non_proxy_response() -> Response<ProxyBody> {
    text_response(StatusCode::INTERNAL_SERVER_ERROR, NON_PROXY_BODY)
}

/// Create an HTTP 502 Bad Gateway error response
pub fn error_response(message: &str) -> Response<ProxyBody> {
    text_response(
        StatusCode::BAD_GATEWAY,
        format!("Proxy error: {}\n", message),
    )
}
