//! Effects (side effects as data).
//!
//! Effects describe the hosting-service writes an invocation wants. They are
//! computed against one snapshot of labels and comments and only name the
//! delta, so replaying a plan against unchanged state produces no effects.

use serde::Serialize;
use std::fmt;

use crate::model::CommentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Add labels in one call. When `announcement` is set, post it as a
    /// comment only after the add succeeded.
    AddLabels {
        labels: Vec<String>,
        announcement: Option<String>,
    },

    RemoveLabel { label: String },

    CreateComment { body: String },

    UpdateComment { id: CommentId, body: String },

    DeleteComment { id: CommentId },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::AddLabels { labels, .. } => write!(f, "add labels [{}]", labels.join(", ")),
            Effect::RemoveLabel { label } => write!(f, "remove label {}", label),
            Effect::CreateComment { .. } => write!(f, "create comment"),
            Effect::UpdateComment { id, .. } => write!(f, "update comment {}", id),
            Effect::DeleteComment { id } => write!(f, "delete comment {}", id),
        }
    }
}
