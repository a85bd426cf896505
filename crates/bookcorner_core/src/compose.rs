//! crates/bookcorner_core/src/compose.rs
//!
//! The compose-area state machine for one viewer's open book detail:
//! either idle, or editing exactly one existing comment with a scratch
//! buffer. The buffer never touches persistence until an explicit save.

use uuid::Uuid;

/// Per-session compose state. At most one comment is in `Editing` at a
/// time; beginning a new edit replaces (implicitly cancels) the prior one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComposeState {
    #[default]
    Idle,
    Editing { comment_id: Uuid, buffer: String },
}

impl ComposeState {
    /// Enters editing on `comment_id`, pre-filling the buffer with the
    /// comment's current text. Any pending edit is discarded.
    pub fn begin_edit(&mut self, comment_id: Uuid, current_text: &str) {
        *self = ComposeState::Editing {
            comment_id,
            buffer: current_text.to_string(),
        };
    }

    /// Discards the buffer and returns to idle. Nothing is persisted.
    pub fn cancel(&mut self) {
        *self = ComposeState::Idle;
    }

    /// The comment id currently being edited, if any.
    pub fn editing_target(&self) -> Option<Uuid> {
        match self {
            ComposeState::Editing { comment_id, .. } => Some(*comment_id),
            ComposeState::Idle => None,
        }
    }

    /// Consumes the pending edit if (and only if) it targets `comment_id`.
    /// Used by save: the session must actually hold an edit on the comment
    /// it is trying to save.
    pub fn finish_edit(&mut self, comment_id: Uuid) -> bool {
        if self.editing_target() == Some(comment_id) {
            *self = ComposeState::Idle;
            true
        } else {
            false
        }
    }
}
