//! Conversation turns and their in-place transitions.
//!
//! DESIGN
//! ======
//! A query adds an optimistic user turn and a thinking turn, both `pending`
//! until the first transport event acknowledges them. The thinking turn is
//! later replaced in place by the final render or an error, or removed when
//! the query is interrupted. Turns are addressed by id, never by position,
//! so late async work can check whether its turn still exists.

#[cfg(test)]
#[path = "conversation_test.rs"]
mod conversation_test;

use serde_json::Value;
use uuid::Uuid;

use super::stages::{Stage, StageTracker};
use crate::net::types::HistoryMessage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnKind {
    User { text: String },
    /// In-flight query; transient.
    Thinking { stages: StageTracker },
    /// Final answer with the stage trail that led to it.
    Assistant { content: String, stages: Vec<Stage> },
    Interrupted { partial: Option<String> },
    Error { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub id: Uuid,
    pub kind: TurnKind,
    /// Optimistic placeholder not yet acknowledged by any transport event.
    pub pending: bool,
}

impl Turn {
    #[must_use]
    pub fn new(kind: TurnKind) -> Self {
        Self { id: Uuid::new_v4(), kind, pending: false }
    }

    #[must_use]
    pub fn pending(kind: TurnKind) -> Self {
        Self { pending: true, ..Self::new(kind) }
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnKind::User { text: text.into() })
    }

    #[must_use]
    pub fn thinking() -> Self {
        Self::new(TurnKind::Thinking { stages: StageTracker::new() })
    }

    #[must_use]
    pub fn interrupted(partial: Option<String>) -> Self {
        Self::new(TurnKind::Interrupted { partial })
    }

    #[must_use]
    pub fn is_thinking(&self) -> bool {
        matches!(self.kind, TurnKind::Thinking { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conversation {
    id: Option<String>,
    turns: Vec<Turn>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation rebuilt from stored backend messages.
    #[must_use]
    pub fn from_history(id: impl Into<String>, messages: &[HistoryMessage]) -> Self {
        let turns = messages
            .iter()
            .map(|message| {
                let content = render_content(&message.content);
                if message.role == "user" {
                    Turn::user(content)
                } else {
                    Turn::new(TurnKind::Assistant { content, stages: Vec::new() })
                }
            })
            .collect();
        Self { id: Some(id.into()), turns }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push(&mut self, turn: Turn) -> Uuid {
        let id = turn.id;
        self.turns.push(turn);
        id
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Turn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    /// Stage tracker of a turn that is still thinking.
    pub fn stages_mut(&mut self, id: Uuid) -> Option<&mut StageTracker> {
        match &mut self.turns.iter_mut().find(|turn| turn.id == id)?.kind {
            TurnKind::Thinking { stages } => Some(stages),
            _ => None,
        }
    }

    /// Swap a turn's kind in place. Returns `false` when the turn is gone.
    pub fn replace(&mut self, id: Uuid, kind: TurnKind) -> bool {
        let Some(turn) = self.turns.iter_mut().find(|turn| turn.id == id) else {
            return false;
        };
        turn.kind = kind;
        turn.pending = false;
        true
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.turns.len();
        self.turns.retain(|turn| turn.id != id);
        self.turns.len() != before
    }

    /// Mark every placeholder acknowledged. Returns how many changed.
    pub fn acknowledge_pending(&mut self) -> usize {
        let mut changed = 0;
        for turn in self.turns.iter_mut().filter(|turn| turn.pending) {
            turn.pending = false;
            changed += 1;
        }
        changed
    }

    /// Turn every acknowledged thinking turn into an interrupted one.
    pub fn interrupt_thinking(&mut self) -> usize {
        let mut changed = 0;
        for turn in &mut self.turns {
            if turn.is_thinking() && !turn.pending {
                turn.kind = TurnKind::Interrupted { partial: None };
                changed += 1;
            }
        }
        changed
    }

    /// Drop unacknowledged placeholders.
    pub fn remove_pending(&mut self) -> usize {
        let before = self.turns.len();
        self.turns.retain(|turn| !turn.pending);
        before - self.turns.len()
    }

    /// Forget the id and every turn.
    pub fn clear(&mut self) {
        self.id = None;
        self.turns.clear();
    }
}

/// Text shown for a result or stored message payload.
#[must_use]
pub fn render_content(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
