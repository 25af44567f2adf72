//! Connection and event routing layer (internal)
//!
//! This module handles the WebSocket transport, BiDi command/response
//! correlation, remote subscriptions and listener fan-out.
//!
//! **Note**: This module is exposed publicly only for integration testing purposes.
//! The types and APIs in this module are considered internal implementation details
//! and may change without notice. User code should go through [`crate::Session`].

#[doc(hidden)]
pub mod connection;
#[doc(hidden)]
pub mod dispatcher;
#[doc(hidden)]
pub mod subscription;
#[doc(hidden)]
pub mod transport;
