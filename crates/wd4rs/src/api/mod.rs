// Public API types module
//
// Option structs with builder methods, consumed by `Session::connect` and the
// request correlator.

pub mod session_options;

pub use session_options::{CorrelatorOptions, SessionOptions};
