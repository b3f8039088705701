//! Client-side state for the query assistant.
//!
//! SYSTEM CONTEXT
//! ==============
//! `conversation` holds the ordered turns, `stages` the thinking-stage state
//! machine inside a thinking turn, `ui` the input/notice chrome, `guard` the
//! database guard card with its timers, `history` the conversation list, and
//! `session` the persisted conversation id. Every mutation bumps a shared
//! [`Revision`] so renderers know when to redraw.

pub mod conversation;
pub mod guard;
pub mod history;
pub mod session;
pub mod stages;
pub mod ui;

use std::sync::Arc;

use tokio::sync::watch;

/// Monotonic change counter observed by renderers.
#[derive(Clone, Debug)]
pub struct Revision {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for Revision {
    fn default() -> Self {
        Self::new()
    }
}

impl Revision {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn bump(&self) {
        self.tx.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}
