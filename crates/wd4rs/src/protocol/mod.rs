// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Protocol layer - typed WebDriver BiDi events and the objects built from them
//
// Architecture:
// - event_kind: the closed registry of event methods
// - events / types: typed payloads, decoded with serde
// - event_mapper: (kind, params) -> BidiEvent
// - request / response / correlator: HTTP exchanges assembled from network events
// - session: the per-connection owner of all of the above

pub mod correlator;
pub mod event_kind;
pub mod event_mapper;
pub mod events;
pub mod request;
pub mod response;
pub mod scope;
pub mod session;
pub mod types;

pub use correlator::RequestCorrelator;
pub use event_kind::{EventKind, EventModule};
pub use event_mapper::{EventEnvelope, MapError, map_event};
pub use events::BidiEvent;
pub use request::{Request, RequestPhase};
pub use response::Response;
pub use scope::Scope;
pub use session::Session;
pub use types::HttpHeader;
