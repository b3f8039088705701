//! Networking modules for the query event channel and REST endpoints.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` defines the event-channel contract with its `chunked` and
//! `stream` strategies, `api` wraps the REST calls (stop, history), and
//! `types` defines the request/response schema.

pub mod api;
pub mod chunked;
pub mod stream;
pub mod transport;
pub mod types;
