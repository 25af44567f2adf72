// Request/response correlator
//
// Links the network events of one HTTP exchange through their shared wire
// request id. `beforeRequestSent` creates a Request; the response-bearing
// events attach a Response to it; `fetchError` sets its failure text.
//
// Redirects reuse the wire id with a higher `redirectCount`. Each hop gets its
// own Request, chained through `redirected_from` / `redirected_to`, and the
// table entry moves to the newest hop. A repeated `beforeRequestSent` with the
// same redirect count is duplicate delivery and returns the tracked Request.
// Response and failure events go to the hop with their own redirect count, so
// a late event for an earlier hop does not land on the newest one.
//
// The table is bounded by entry count and age, and entries for a destroyed
// browsing context are dropped with it.

use crate::api::CorrelatorOptions;
use crate::protocol::EventKind;
use crate::protocol::events::{
    BaseParameters, BeforeRequestSent, FetchError, ResponseParameters,
};
use crate::protocol::request::Request;
use crate::protocol::response::Response;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

struct Entry {
    request: Request,
    inserted_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct Table {
    entries: HashMap<String, Entry>,
    // (request id, seq) in insertion order; stale when the seq no longer matches
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

impl Table {
    fn insert(&mut self, request: Request, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = request.id().to_string();
        self.order.push_back((id.clone(), seq));
        self.entries.insert(
            id,
            Entry {
                request,
                inserted_at: now,
                seq,
            },
        );
    }

    fn is_live(&self, id: &str, seq: u64) -> bool {
        self.entries.get(id).is_some_and(|e| e.seq == seq)
    }

    fn evict(&mut self, now: Instant, ttl: Option<Duration>, max_entries: usize) -> usize {
        let mut evicted = 0;

        while let Some((id, seq)) = self.order.front() {
            if !self.is_live(id, *seq) {
                self.order.pop_front();
                continue;
            }
            let expired = match (ttl, self.entries.get(id.as_str())) {
                (Some(ttl), Some(entry)) => now.duration_since(entry.inserted_at) >= ttl,
                _ => false,
            };
            if !expired && self.entries.len() <= max_entries {
                break;
            }
            if let Some((id, _)) = self.order.pop_front() {
                self.entries.remove(&id);
                evicted += 1;
            }
        }

        // Drop stale markers left behind by context eviction and redirects
        if self.order.len() > self.entries.len() * 2 + 64 {
            let entries = &self.entries;
            self.order
                .retain(|(id, seq)| entries.get(id).is_some_and(|e| e.seq == *seq));
        }

        evicted
    }
}

/// Tracks in-flight requests for one session.
pub struct RequestCorrelator {
    table: Mutex<Table>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new(CorrelatorOptions::default())
    }
}

impl RequestCorrelator {
    pub fn new(options: CorrelatorOptions) -> Self {
        let ttl_ms = options.resolved_ttl_ms();
        Self {
            table: Mutex::new(Table::default()),
            max_entries: options.resolved_max_entries(),
            ttl: (ttl_ms > 0).then(|| Duration::from_millis(ttl_ms)),
        }
    }

    /// Creates (or, for duplicate delivery, returns) the Request for this
    /// event.
    pub fn on_before_request_sent(&self, event: &BeforeRequestSent) -> Request {
        self.on_before_request_sent_at(event, Instant::now())
    }

    fn on_before_request_sent_at(&self, event: &BeforeRequestSent, now: Instant) -> Request {
        let base = &event.base;
        let id = base.request_id();
        let mut table = self.table.lock();

        let previous = table.entries.get(id).map(|e| e.request.clone());
        let request = match previous {
            Some(existing) if base.redirect_count <= existing.redirect_count() => {
                tracing::debug!(
                    "Duplicate beforeRequestSent for {} (redirectCount={})",
                    id,
                    base.redirect_count
                );
                return existing;
            }
            Some(existing) => {
                tracing::debug!(
                    "Redirect hop {} for {}: {} -> {}",
                    base.redirect_count,
                    id,
                    existing.url(),
                    base.request.url
                );
                let next = Request::from_event(base, Some(existing.clone()));
                existing.set_redirected_to(&next);
                next
            }
            None => Request::from_event(base, None),
        };

        table.insert(request.clone(), now);
        let evicted = table.evict(now, self.ttl, self.max_entries);
        if evicted > 0 {
            tracing::debug!("Evicted {} tracked requests", evicted);
        }
        request
    }

    /// Attaches the response from `network.responseStarted`.
    pub fn on_response_started(&self, event: &ResponseParameters) -> Response {
        self.attach_response(EventKind::ResponseStarted, event)
    }

    /// Attaches the response from `network.responseCompleted`.
    pub fn on_response_completed(&self, event: &ResponseParameters) -> Response {
        self.attach_response(EventKind::ResponseCompleted, event)
    }

    /// Attaches the 401/407 response from `network.authRequired`.
    pub fn on_auth_required(&self, event: &ResponseParameters) -> Response {
        self.attach_response(EventKind::AuthRequired, event)
    }

    fn attach_response(&self, source: EventKind, event: &ResponseParameters) -> Response {
        let id = event.base.request_id();
        match self.request_for(&event.base) {
            Some(request) => {
                let response = Response::from_event(id, source, &event.response, Some(&request));
                request.set_response(&response);
                response
            }
            None => {
                tracing::warn!(
                    "{} for untracked request {} (redirectCount={}), not correlated",
                    source,
                    id,
                    event.base.redirect_count
                );
                Response::from_event(id, source, &event.response, None)
            }
        }
    }

    /// Records the failure text from `network.fetchError`. Returns the failed
    /// request, or `None` if it is not tracked.
    pub fn on_fetch_error(&self, event: &FetchError) -> Option<Request> {
        let Some(request) = self.request_for(&event.base) else {
            tracing::warn!(
                "network.fetchError for untracked request {}: {}",
                event.base.request_id(),
                event.error_text
            );
            return None;
        };
        request.set_failure(event.error_text.clone());
        Some(request)
    }

    /// The newest hop tracked under `id`.
    pub fn request(&self, id: &str) -> Option<Request> {
        self.table.lock().entries.get(id).map(|e| e.request.clone())
    }

    /// The hop an event belongs to: the tracked request with the event's id,
    /// walked back along `redirected_from` to the event's `redirectCount`.
    pub fn request_for(&self, base: &BaseParameters) -> Option<Request> {
        let mut hop = self.request(base.request_id())?;
        while hop.redirect_count() > base.redirect_count {
            hop = hop.redirected_from()?;
        }
        (hop.redirect_count() == base.redirect_count).then_some(hop)
    }

    /// Drops every request issued by `context`. Returns how many were dropped.
    pub fn evict_context(&self, context: &str) -> usize {
        let mut table = self.table.lock();
        let before = table.entries.len();
        table
            .entries
            .retain(|_, e| e.request.context() != Some(context));
        let evicted = before - table.entries.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} requests of closed context {}", evicted, context);
        }
        evicted
    }

    /// Applies age and size eviction without inserting.
    pub fn evict_expired(&self) -> usize {
        self.table
            .lock()
            .evict(Instant::now(), self.ttl, self.max_entries)
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut table = self.table.lock();
        table.entries.clear();
        table.order.clear();
    }
}
