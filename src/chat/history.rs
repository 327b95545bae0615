//! Append-only conversation log
//!
//! The single source of truth for a session. Consecutive same-role turns are
//! allowed here; they are merged only when normalizing for a provider.

use super::content::Turn;

#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn at the tail
    pub fn append(&mut self, turn: Turn) {
        tracing::debug!(
            "History append: role={} items={}",
            turn.role.as_str(),
            turn.content.len()
        );
        self.turns.push(turn);
    }

    /// All turns in insertion order
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Drop every turn, returning how many were removed
    ///
    /// Remote and staged attachments are released by `SessionState::reset`.
    pub(crate) fn clear(&mut self) -> usize {
        let n = self.turns.len();
        self.turns.clear();
        n
    }
}
