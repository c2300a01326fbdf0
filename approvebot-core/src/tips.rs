//! The tips comment: one bot-authored status comment per change request.
//!
//! The body has two parts. Part 1 summarises the current agreement,
//! rejection or approval evidence. Part 2, present only on the LGTM
//! template, lists suggested approvers and starts at [`SUGGESTED_MARKER`].
//! Rendering is a pure function of its inputs so that an unchanged
//! situation renders byte-identical text and reconciles to a no-op.

use crate::consensus::{Consensus, Decision};
use crate::effect::Effect;
use crate::model::{Comment, CommentId, Login};

/// Hidden marker identifying the tips comment among the bot's comments.
pub const TIPS_MARKER: &str = "<!-- approvebot:tips -->";

/// Hidden marker where the suggested-approvers part begins.
pub const SUGGESTED_MARKER: &str = "<!-- approvebot:suggested-approvers -->";

/// The existing tips comment, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApproveTips {
    pub id: Option<CommentId>,
    pub body: String,
}

impl ApproveTips {
    /// Locate the first bot comment carrying the tips marker.
    pub fn find(comments: &[Comment], bot: &Login) -> Self {
        comments
            .iter()
            .filter(|c| &c.author == bot)
            .find(|c| c.body.starts_with(TIPS_MARKER))
            .map(|c| Self {
                id: Some(c.id),
                body: c.body.clone(),
            })
            .unwrap_or_default()
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    /// Part 2 of the body, marker included.
    pub fn suggestions(&self) -> Option<&str> {
        self.body.find(SUGGESTED_MARKER).map(|at| &self.body[at..])
    }

    pub fn has_suggestions(&self) -> bool {
        self.suggestions().is_some()
    }
}

fn mentions(logins: &[Login]) -> String {
    logins
        .iter()
        .map(|l| format!("@{}", l))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_suggestions(suggested: &[Login]) -> String {
    [
        SUGGESTED_MARKER.to_string(),
        format!("Suggested approvers: {}", mentions(suggested)),
        "Any of them can approve by commenting `/approve`.".to_string(),
    ]
    .join("\n")
}

/// Render the tips body for a consensus.
///
/// `suggested` is the freshly computed approver suggestion, or `None` when
/// suggestions were not regenerated this time; in that case an LGTM body
/// keeps the Part 2 of `old` as it is. [`Decision::None`] renders empty.
pub fn render(consensus: &Consensus, suggested: Option<&[Login]>, old: &ApproveTips) -> String {
    let evidence = &consensus.evidence;
    let mut lines: Vec<String> = vec![TIPS_MARKER.to_string()];

    match consensus.decision {
        Decision::None => return String::new(),

        Decision::Lgtm => {
            lines.push("**Looks good to me**".to_string());
            lines.push(String::new());
            if !evidence.agreed.is_empty() {
                lines.push(format!("Agreed by reviewers: {}", mentions(&evidence.agreed)));
            }
            if !evidence.approved.is_empty() {
                lines.push(format!("Approved by: {}", mentions(&evidence.approved)));
            }
            lines.push("More approvals are needed before this can be merged.".to_string());

            let part2 = match suggested {
                Some([]) => None,
                Some(logins) => Some(render_suggestions(logins)),
                None => old.suggestions().map(str::to_string),
            };
            if let Some(part2) = part2 {
                lines.push(String::new());
                lines.push(part2);
            }
        }

        Decision::RequestChange if !evidence.rejected.is_empty() => {
            lines.push("**Changes requested**".to_string());
            lines.push(String::new());
            lines.push(format!(
                "Rejected by approvers: {}",
                mentions(&evidence.rejected)
            ));
            lines.push(
                "The pull request can't be merged until they comment `/approve`.".to_string(),
            );
        }

        Decision::RequestChange => {
            lines.push("**Changes requested**".to_string());
            lines.push(String::new());
            lines.push(format!(
                "Reviewers who think this looks bad: {}",
                mentions(&evidence.disagreed)
            ));
            lines.push("Address their comments, then ask them to comment `/lgtm`.".to_string());
        }

        Decision::Approved => {
            lines.push("**Approved**".to_string());
            lines.push(String::new());
            lines.push(format!("Approved by: {}", mentions(&evidence.approved)));
            lines.push("The pull request has enough approvals to be merged.".to_string());
        }
    }

    lines.join("\n")
}

/// Reconcile a rendered body against the existing tips comment.
///
/// Empty or unchanged bodies need no write. Otherwise the existing comment is
/// updated in place, or a new one is created.
pub fn reconcile(body: &str, old: &ApproveTips) -> Option<Effect> {
    if body.is_empty() || body == old.body {
        return None;
    }

    Some(match old.id {
        Some(id) => Effect::UpdateComment {
            id,
            body: body.to_string(),
        },
        None => Effect::CreateComment {
            body: body.to_string(),
        },
    })
}
