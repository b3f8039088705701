//! Query orchestration client for the analytics assistant.
//!
//! SYSTEM CONTEXT
//! ==============
//! `net` opens the event channel to the backend (chunked HTTP or WebSocket)
//! and wraps the REST endpoints, `state` holds the conversation, stage list,
//! guard warning and history panel, and `controller` drives one query's
//! lifecycle across all of them. Renderers read `QueryController::snapshot`
//! and wake on `QueryController::subscribe`.

pub mod config;
pub mod controller;
pub mod error;
pub mod net;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ClientConfig, QuerySettings, Timings};
pub use controller::{ControllerDeps, QueryController, SendOutcome, Snapshot, StopOutcome};
pub use error::ClientError;
