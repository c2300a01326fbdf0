//! Events that trigger a review pass.

use serde::{Deserialize, Serialize};

use approvebot_core::{Comment, PrRef};

/// Something that happened on a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The request was opened.
    PullRequestOpened,

    /// New commits were pushed to the request.
    PullRequestSynchronized,

    /// Someone commented on the request.
    CommentCreated { comment: Comment },

    /// CI finished for the head commit.
    CiStatusChanged { passed: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub pr: PrRef,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(pr: PrRef, kind: EventKind) -> Self {
        Self { pr, kind }
    }
}
