// Request
//
// One hop of an HTTP exchange, created from `network.beforeRequestSent`.
// Identity fields are fixed at creation. The response and failure slots are
// filled in later by the correlator (the only writer) as events arrive; readers
// always see a consistent snapshot.

use crate::protocol::events::BaseParameters;
use crate::protocol::response::{Response, ResponseInner};
use crate::protocol::types::{HttpHeader, normalize_headers};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// No response or failure seen yet
    Pending,
    /// A response was attached
    Responded,
    /// `network.fetchError` was received
    Failed,
}

#[derive(Default)]
struct Slots {
    response: Option<Arc<ResponseInner>>,
    failure: String,
    redirected_to: Option<Weak<RequestInner>>,
}

pub(crate) struct RequestInner {
    id: String,
    url: String,
    method: String,
    headers: Vec<HttpHeader>,
    resource_type: &'static str,
    navigation: Option<String>,
    context: Option<String>,
    redirect_count: u64,
    timestamp: u64,
    created_at: Instant,
    redirected_from: Option<Request>,
    slots: RwLock<Slots>,
}

/// An HTTP request observed on the wire.
///
/// Cheap to clone; clones share state. Two `Request`s are equal only if they
/// are the same hop.
///
/// See: <https://playwright.dev/docs/api/class-request>
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl Request {
    pub(crate) fn from_event(base: &BaseParameters, redirected_from: Option<Request>) -> Self {
        let data = &base.request;
        let headers = normalize_headers(&data.headers);
        let resource_type = infer_resource_type(data.destination.as_deref(), &headers);

        Self {
            inner: Arc::new(RequestInner {
                id: data.request.clone(),
                url: data.url.clone(),
                method: data.method.clone(),
                headers,
                resource_type,
                navigation: base.navigation.clone(),
                context: base.context.clone(),
                redirect_count: base.redirect_count,
                timestamp: base.timestamp,
                created_at: Instant::now(),
                redirected_from,
                slots: RwLock::new(Slots::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RequestInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner_arc(&self) -> Arc<RequestInner> {
        self.inner.clone()
    }

    pub(crate) fn set_response(&self, response: &Response) {
        self.inner.slots.write().response = Some(response.inner_arc());
    }

    pub(crate) fn set_failure(&self, failure: impl Into<String>) {
        self.inner.slots.write().failure = failure.into();
    }

    pub(crate) fn set_redirected_to(&self, next: &Request) {
        self.inner.slots.write().redirected_to = Some(Arc::downgrade(&next.inner));
    }

    /// Wire request id. Shared by every hop of a redirect chain.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Request headers with lower-cased names, in wire order.
    pub fn headers(&self) -> &[HttpHeader] {
        &self.inner.headers
    }

    /// Headers as a map. Repeated names keep the last value.
    pub fn all_headers(&self) -> HashMap<String, String> {
        self.inner
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect()
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// `document`, `stylesheet`, `image`, `media`, `font`, `script`, `xhr` or
    /// `fetch`.
    pub fn resource_type(&self) -> &str {
        self.inner.resource_type
    }

    /// True when the request belongs to a navigation.
    pub fn is_navigation_request(&self) -> bool {
        self.inner.navigation.is_some()
    }

    pub fn navigation_id(&self) -> Option<&str> {
        self.inner.navigation.as_deref()
    }

    /// Browsing context that issued the request, if any.
    pub fn context(&self) -> Option<&str> {
        self.inner.context.as_deref()
    }

    pub fn redirect_count(&self) -> u64 {
        self.inner.redirect_count
    }

    /// Wire timestamp of `beforeRequestSent`, milliseconds since the epoch.
    pub fn timestamp(&self) -> u64 {
        self.inner.timestamp
    }

    /// Local time the record was created.
    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// The previous hop, if this request is the target of a redirect.
    pub fn redirected_from(&self) -> Option<Request> {
        self.inner.redirected_from.clone()
    }

    /// The next hop, if this request was redirected and the next hop is still
    /// alive.
    pub fn redirected_to(&self) -> Option<Request> {
        self.inner
            .slots
            .read()
            .redirected_to
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Request::from_inner)
    }

    /// The current response, if one has arrived.
    pub fn response(&self) -> Option<Response> {
        let data = self.inner.slots.read().response.clone()?;
        Some(Response::from_parts(Some(self.inner.clone()), data))
    }

    /// Failure text from `network.fetchError`, empty if none.
    pub fn failure(&self) -> String {
        self.inner.slots.read().failure.clone()
    }

    pub fn phase(&self) -> RequestPhase {
        let slots = self.inner.slots.read();
        if !slots.failure.is_empty() {
            RequestPhase::Failed
        } else if slots.response.is_some() {
            RequestPhase::Responded
        } else {
            RequestPhase::Pending
        }
    }

    /// True if both handles refer to the same hop.
    pub fn ptr_eq(&self, other: &Request) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Request {}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("url", &self.inner.url)
            .field("redirect_count", &self.inner.redirect_count)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Resource type from the fetch destination, falling back to request headers.
fn infer_resource_type(destination: Option<&str>, headers: &[HttpHeader]) -> &'static str {
    if let Some(dest) = destination {
        match dest.to_ascii_lowercase().as_str() {
            "document" => return "document",
            "style" | "stylesheet" => return "stylesheet",
            "image" => return "image",
            "media" | "audio" | "video" | "track" => return "media",
            "font" => return "font",
            "script" | "worker" | "sharedworker" | "serviceworker" => return "script",
            "xhr" => return "xhr",
            "fetch" => return "fetch",
            _ => {}
        }
    }

    let header = |name: &str| {
        headers
            .iter()
            .rev()
            .find(|h| h.name == name)
            .map(|h| h.value.to_ascii_lowercase())
    };

    if let Some(accept) = header("accept") {
        if accept.contains("text/html") {
            return "document";
        }
        if accept.contains("text/css") {
            return "stylesheet";
        }
        if accept.contains("image/") {
            return "image";
        }
        if accept.contains("javascript") {
            return "script";
        }
    }
    if header("x-requested-with").as_deref() == Some("xmlhttprequest") {
        return "xhr";
    }
    "fetch"
}
