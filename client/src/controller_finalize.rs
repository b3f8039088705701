//! Result handling: execution-step playback and the final render swap.

use events::ExecutionStep;
use serde_json::Value;
use tracing::{debug, info};

use super::{ActiveQuery, QueryController, SendOutcome};
use crate::state::conversation::{TurnKind, render_content};
use crate::state::stages::StageTracker;

impl QueryController {
    /// Reveal the backend's execution steps, complete every stage, wait for
    /// the settle delay, then swap the thinking turn for the answer.
    pub(super) async fn finalize(&self, query: &ActiveQuery, content: &Value, steps: &[ExecutionStep]) -> SendOutcome {
        if self
            .with_stages(query.turn, StageTracker::begin_finalizing)
            .is_none()
        {
            return SendOutcome::Interrupted;
        }

        if !self.play_steps(query, steps).await {
            debug!(query_id = query.id, "query: step playback abandoned");
            return SendOutcome::Interrupted;
        }

        self.with_stages(query.turn, StageTracker::complete_all);
        if !Self::pause(&query.cancel, self.inner.timings.finalize_settle).await {
            return SendOutcome::Interrupted;
        }

        let content = render_content(content);
        let swapped = self.update(|state| {
            if !state.owns(query.id) {
                return false;
            }
            let Some(stages) = state.conversation.stages_mut(query.turn) else {
                return false;
            };
            let stages = std::mem::take(stages).into_stages();
            state
                .conversation
                .replace(query.turn, TurnKind::Assistant { content, stages })
        });

        if !swapped {
            return SendOutcome::Interrupted;
        }
        info!(query_id = query.id, steps = steps.len(), "query: answer rendered");
        SendOutcome::Completed
    }

    /// Returns `false` when the thinking turn vanished or the query was
    /// cancelled mid-playback. An empty step list is a no-op.
    async fn play_steps(&self, query: &ActiveQuery, steps: &[ExecutionStep]) -> bool {
        if steps.is_empty() {
            return true;
        }

        let timings = self.inner.timings;
        for (position, step) in steps.iter().enumerate() {
            let label = step.label(position);
            if self
                .with_stages(query.turn, |stages| stages.push_step(label))
                .is_none()
            {
                return false;
            }
            if !Self::pause(&query.cancel, timings.step_delay).await {
                return false;
            }
        }

        self.with_stages(query.turn, StageTracker::complete_active);
        Self::pause(&query.cancel, timings.playback_settle).await
    }
}
