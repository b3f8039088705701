//! Thinking-stage state machine.
//!
//! DESIGN
//! ======
//! A thinking turn shows an ordered list of stages. The backend may declare
//! them up front (`apply_plan`) or only report progress (`advance`); either
//! way at most one stage is active and stages complete left to right. When
//! progress outruns the plan the tracker degrades to appending new stages.
//!
//! Phases: `Empty -> Planned -> Advancing -> Finalizing -> Done`. A plan is
//! accepted until one of its own stages has advanced; a late plan replaces
//! any ad-hoc stages wholesale.

#[cfg(test)]
#[path = "stages_test.rs"]
mod stages_test;

use events::truncate_chars;

pub const STAGE_LABEL_MAX_CHARS: usize = 10;
pub const STAGE_DETAIL_MAX_CHARS: usize = 80;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StageStatus {
    #[default]
    Pending,
    Active,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    pub label: String,
    /// Latest progress text reported while this stage was active.
    pub detail: Option<String>,
    pub status: StageStatus,
}

impl Stage {
    fn pending(label: String) -> Self {
        Self { label, detail: None, status: StageStatus::Pending }
    }

    fn active(label: String) -> Self {
        Self { label, detail: None, status: StageStatus::Active }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StagePhase {
    #[default]
    Empty,
    Planned,
    Advancing,
    Finalizing,
    Done,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageTracker {
    stages: Vec<Stage>,
    phase: StagePhase,
    /// Whether the current stages came from a plan rather than ad-hoc progress.
    planned: bool,
}

impl StageTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages in display order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Current step of the stage machine.
    #[must_use]
    pub fn phase(&self) -> StagePhase {
        self.phase
    }

    /// Consume the tracker, keeping its stages for the finished turn.
    #[must_use]
    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    /// Replace all stages with the declared plan and activate the first.
    ///
    /// Returns `false` (no change) for an empty plan, once finalizing, or
    /// after a planned stage has already advanced.
    pub fn apply_plan(&mut self, labels: &[String]) -> bool {
        if labels.is_empty() || matches!(self.phase, StagePhase::Finalizing | StagePhase::Done) {
            return false;
        }
        if self.planned && self.phase == StagePhase::Advancing {
            return false;
        }

        self.stages = labels
            .iter()
            .map(|label| Stage::pending(truncate_chars(label.trim(), STAGE_LABEL_MAX_CHARS)))
            .collect();
        if let Some(first) = self.stages.first_mut() {
            first.status = StageStatus::Active;
        }
        self.planned = true;
        self.phase = StagePhase::Planned;
        true
    }

    /// Move to the next stage with `text` as its detail, appending one when
    /// no declared stage is left. Returns `false` once finalizing.
    pub fn advance(&mut self, text: &str) -> bool {
        if matches!(self.phase, StagePhase::Finalizing | StagePhase::Done) {
            return false;
        }

        let text = text.trim();
        self.complete_active();
        let detail = (!text.is_empty()).then(|| truncate_chars(text, STAGE_DETAIL_MAX_CHARS));

        if let Some(next) = self
            .stages
            .iter_mut()
            .find(|stage| stage.status == StageStatus::Pending)
        {
            next.status = StageStatus::Active;
            next.detail = detail;
        } else {
            let label = if text.is_empty() {
                format!("step {}", self.stages.len() + 1)
            } else {
                truncate_chars(text, STAGE_LABEL_MAX_CHARS)
            };
            let mut stage = Stage::active(label);
            stage.detail = detail;
            self.stages.push(stage);
        }

        self.phase = StagePhase::Advancing;
        true
    }

    /// Enter result handling; plans and progress are ignored from here on.
    pub fn begin_finalizing(&mut self) {
        if self.phase != StagePhase::Done {
            self.phase = StagePhase::Finalizing;
        }
    }

    /// Complete the active stage and append `label` as the new active stage.
    pub fn push_step(&mut self, label: String) {
        self.complete_active();
        self.stages.push(Stage::active(label));
    }

    pub fn complete_active(&mut self) {
        for stage in &mut self.stages {
            if stage.status == StageStatus::Active {
                stage.status = StageStatus::Completed;
            }
        }
    }

    /// Mark every stage completed and finish the machine.
    pub fn complete_all(&mut self) {
        for stage in &mut self.stages {
            stage.status = StageStatus::Completed;
        }
        self.phase = StagePhase::Done;
    }

    /// Number of active stages; never more than one.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.count(StageStatus::Active)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.count(StageStatus::Completed)
    }

    fn count(&self, status: StageStatus) -> usize {
        self.stages
            .iter()
            .filter(|stage| stage.status == status)
            .count()
    }
}
