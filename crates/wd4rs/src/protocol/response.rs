// Response
//
// Built from `network.responseStarted`, `network.responseCompleted` or
// `network.authRequired`. The response data lives in `ResponseInner`, which a
// Request stores in its response slot. A `Response` handle pairs that data with
// its Request, so the link survives correlator eviction and there is no
// Request <-> Response cycle. `request()` is `None` only for orphans.

use crate::protocol::EventKind;
use crate::protocol::request::{Request, RequestInner};
use crate::protocol::types::{AuthChallenge, HttpHeader, ResponseData, normalize_headers};
use std::sync::Arc;

pub(crate) struct ResponseInner {
    request_id: String,
    source: EventKind,
    url: String,
    status: u16,
    status_text: String,
    protocol: String,
    mime_type: String,
    from_cache: bool,
    headers: Vec<HttpHeader>,
    bytes_received: u64,
    auth_challenges: Vec<AuthChallenge>,
}

/// An HTTP response observed on the wire.
///
/// Equality is identity of the response data, like [`Request`]: handles
/// obtained from the correlator and from `request.response()` compare equal.
///
/// See: <https://playwright.dev/docs/api/class-response>
#[derive(Clone)]
pub struct Response {
    request: Option<Arc<RequestInner>>,
    inner: Arc<ResponseInner>,
}

impl Response {
    pub(crate) fn from_event(
        request_id: &str,
        source: EventKind,
        data: &ResponseData,
        request: Option<&Request>,
    ) -> Self {
        Self {
            request: request.map(Request::inner_arc),
            inner: Arc::new(ResponseInner {
                request_id: request_id.to_string(),
                source,
                url: data.url.clone(),
                status: data.status,
                status_text: data.status_text.clone(),
                protocol: data.protocol.clone(),
                mime_type: data.mime_type.clone(),
                from_cache: data.from_cache,
                headers: normalize_headers(&data.headers),
                bytes_received: data.bytes_received,
                auth_challenges: data.auth_challenges.clone().unwrap_or_default(),
            }),
        }
    }

    pub(crate) fn from_parts(
        request: Option<Arc<RequestInner>>,
        inner: Arc<ResponseInner>,
    ) -> Self {
        Self { request, inner }
    }

    pub(crate) fn inner_arc(&self) -> Arc<ResponseInner> {
        self.inner.clone()
    }

    /// The request this response answers, `None` for orphan responses.
    pub fn request(&self) -> Option<Request> {
        self.request.clone().map(Request::from_inner)
    }

    /// Wire request id, available even for orphan responses.
    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    /// The event this response was built from.
    pub fn source(&self) -> EventKind {
        self.inner.source
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    /// Status text as sent, or `"OK"` for a 2xx response that came without one.
    pub fn status_text(&self) -> &str {
        if self.inner.status_text.is_empty() && self.ok() {
            "OK"
        } else {
            &self.inner.status_text
        }
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.inner.status)
    }

    pub fn protocol(&self) -> &str {
        &self.inner.protocol
    }

    pub fn mime_type(&self) -> &str {
        &self.inner.mime_type
    }

    pub fn from_cache(&self) -> bool {
        self.inner.from_cache
    }

    /// Response headers with lower-cased names, in wire order.
    pub fn headers(&self) -> &[HttpHeader] {
        &self.inner.headers
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Every value of a repeated header, in wire order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.inner
            .headers
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    pub fn bytes_received(&self) -> u64 {
        self.inner.bytes_received
    }

    /// Challenges sent with `network.authRequired`.
    pub fn auth_challenges(&self) -> &[AuthChallenge] {
        &self.inner.auth_challenges
    }

    pub fn ptr_eq(&self, other: &Response) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Response {}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("request_id", &self.inner.request_id)
            .field("status", &self.inner.status)
            .field("url", &self.inner.url)
            .field("source", &self.inner.source)
            .finish()
    }
}
