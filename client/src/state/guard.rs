//! Database guard warning card with timed affordances.
//!
//! DESIGN
//! ======
//! When the backend's pre-flight database check fails the client shows one
//! warning card offering "continue anyway" and "configure connection". The
//! card counts down once per second and dismisses itself after
//! `auto_dismiss_ms` (default 8000, `0` disables both timers), fading briefly
//! before it disappears.
//!
//! TIMER OWNERSHIP
//! ===============
//! The countdown and dismiss tasks are owned by the live warning and aborted
//! by `GuardTimers::dispose` (also on drop). Every warning gets a new
//! generation number; a timer that wakes for an older generation does
//! nothing, so a replaced card can never be touched by its predecessor's
//! timers.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use events::DbUnavailablePayload;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Revision;

pub const DEFAULT_AUTO_DISMISS_MS: u64 = 8000;
pub const MAX_SUGGESTIONS: usize = 4;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

const DEFAULT_SUGGESTIONS: &[&str] = &[
    "Check that the database server is running",
    "Verify the host, port and credentials in connection settings",
    "Retry once the connection is restored",
];

/// Snapshot of the visible warning card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbGuardWarning {
    pub message: String,
    /// Human-readable connection target.
    pub target: String,
    pub checked_at: Option<String>,
    pub suggestions: Vec<String>,
    pub auto_dismiss_ms: u64,
    /// Seconds until auto-dismiss; `None` when auto-dismiss is disabled.
    pub remaining_seconds: Option<u64>,
    /// Query to resubmit on "continue anyway".
    pub original_query: String,
    pub fading: bool,
}

impl DbGuardWarning {
    #[must_use]
    pub fn from_payload(payload: &DbUnavailablePayload, original_query: &str) -> Self {
        let message = [Some(payload.error.as_str()), payload.db_check.error.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|text| !text.is_empty())
            .unwrap_or("database unavailable")
            .to_owned();

        let mut suggestions: Vec<String> = payload
            .db_check
            .suggestions
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .take(MAX_SUGGESTIONS)
            .map(str::to_owned)
            .collect();
        if suggestions.is_empty() {
            suggestions = DEFAULT_SUGGESTIONS
                .iter()
                .map(|s| (*s).to_owned())
                .collect();
        }

        let auto_dismiss_ms = payload
            .ui
            .auto_dismiss_ms
            .unwrap_or(DEFAULT_AUTO_DISMISS_MS);

        Self {
            message,
            target: payload.connection.display(),
            checked_at: payload.db_check.checked_at.clone(),
            suggestions,
            auto_dismiss_ms,
            remaining_seconds: (auto_dismiss_ms > 0).then(|| auto_dismiss_ms.div_ceil(1000)),
            original_query: original_query.to_owned(),
            fading: false,
        }
    }
}

// =============================================================================
// TIMERS
// =============================================================================

/// Dismiss timeout and countdown interval of one warning.
#[derive(Debug, Default)]
struct GuardTimers {
    dismiss: Option<JoinHandle<()>>,
    countdown: Option<JoinHandle<()>>,
}

impl GuardTimers {
    fn dispose(&mut self) {
        if let Some(handle) = self.dismiss.take() {
            handle.abort();
        }
        self.stop_countdown();
    }

    fn stop_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    fn live_count(&self) -> usize {
        [&self.dismiss, &self.countdown]
            .into_iter()
            .flatten()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl Drop for GuardTimers {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[derive(Debug)]
struct LiveWarning {
    warning: DbGuardWarning,
    generation: u64,
    timers: GuardTimers,
}

#[derive(Debug, Default)]
struct GuardSlot {
    live: Option<LiveWarning>,
    generation: u64,
}

impl GuardSlot {
    fn live_for(&mut self, generation: u64) -> Option<&mut LiveWarning> {
        self.live
            .as_mut()
            .filter(|live| live.generation == generation)
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// Owner of the single live guard warning.
#[derive(Clone, Debug)]
pub struct GuardManager {
    slot: Arc<Mutex<GuardSlot>>,
    revision: Revision,
    fade: Duration,
}

impl GuardManager {
    #[must_use]
    pub fn new(revision: Revision, fade: Duration) -> Self {
        Self { slot: Arc::new(Mutex::new(GuardSlot::default())), revision, fade }
    }

    fn lock(&self) -> MutexGuard<'_, GuardSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Show a warning, disposing any previous one first.
    ///
    /// Must be called inside a tokio runtime when auto-dismiss is enabled.
    pub fn show(&self, payload: &DbUnavailablePayload, original_query: &str) {
        let warning = DbGuardWarning::from_payload(payload, original_query);
        let auto_dismiss_ms = warning.auto_dismiss_ms;
        info!(
            target_db = %warning.target,
            auto_dismiss_ms,
            "guard: database unavailable"
        );

        let mut slot = self.lock();
        if let Some(mut previous) = slot.live.take() {
            previous.timers.dispose();
        }
        slot.generation += 1;
        let generation = slot.generation;

        let timers = if auto_dismiss_ms == 0 {
            GuardTimers::default()
        } else {
            GuardTimers {
                dismiss: Some(self.spawn_dismiss(generation, Duration::from_millis(auto_dismiss_ms))),
                countdown: Some(self.spawn_countdown(generation)),
            }
        };
        slot.live = Some(LiveWarning { warning, generation, timers });
        drop(slot);

        self.revision.bump();
    }

    #[must_use]
    pub fn current(&self) -> Option<DbGuardWarning> {
        self.lock()
            .live
            .as_ref()
            .map(|live| live.warning.clone())
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lock().live.is_some()
    }

    /// Timer tasks still owned by the live warning.
    #[must_use]
    pub fn live_timer_count(&self) -> usize {
        self.lock()
            .live
            .as_ref()
            .map_or(0, |live| live.timers.live_count())
    }

    /// Clear the card and hand back the query to resubmit.
    pub fn continue_anyway(&self) -> Option<String> {
        let live = self.take()?;
        Some(live.warning.original_query.clone())
    }

    /// Clear the card on the way to connection settings. Returns whether one was shown.
    pub fn configure(&self) -> bool {
        self.take().is_some()
    }

    /// Close the card without acting on it.
    pub fn dismiss(&self) -> bool {
        self.take().is_some()
    }

    fn take(&self) -> Option<LiveWarning> {
        let mut live = self.lock().live.take()?;
        live.timers.dispose();
        self.revision.bump();
        Some(live)
    }

    fn spawn_countdown(&self, generation: u64) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(COUNTDOWN_TICK);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !manager.tick_countdown(generation) {
                    break;
                }
            }
        })
    }

    fn tick_countdown(&self, generation: u64) -> bool {
        let mut slot = self.lock();
        let Some(live) = slot.live_for(generation) else {
            return false;
        };
        let Some(remaining) = live.warning.remaining_seconds else {
            return false;
        };
        let remaining = remaining.saturating_sub(1);
        live.warning.remaining_seconds = Some(remaining);
        drop(slot);
        self.revision.bump();
        remaining > 0
    }

    fn spawn_dismiss(&self, generation: u64, after: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if !manager.begin_fade(generation) {
                return;
            }
            tokio::time::sleep(manager.fade).await;
            manager.expire(generation);
        })
    }

    fn begin_fade(&self, generation: u64) -> bool {
        let mut slot = self.lock();
        let Some(live) = slot.live_for(generation) else {
            return false;
        };
        live.warning.fading = true;
        live.warning.remaining_seconds = Some(0);
        live.timers.stop_countdown();
        drop(slot);
        self.revision.bump();
        true
    }

    fn expire(&self, generation: u64) {
        let mut slot = self.lock();
        let Some(live) = slot.live_for(generation) else {
            return;
        };
        // Detach our own handle so dropping the warning does not abort this task.
        drop(live.timers.dismiss.take());
        slot.live = None;
        drop(slot);
        debug!(generation, "guard: warning expired");
        self.revision.bump();
    }
}
