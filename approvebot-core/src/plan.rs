//! Pure planning of one review invocation.
//!
//! Given one fetched snapshot, [`plan_review`] derives the consensus and the
//! ordered list of writes needed to bring labels and the tips comment in
//! line with it. Labels and tips come from the same consensus, so a plan is
//! never half of one decision and half of another.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::command::Command;
use crate::consensus::{compute, eligible_comments, Consensus, Decision};
use crate::effect::Effect;
use crate::labels::label_effects;
use crate::model::{ChangeRequest, Comment, Login};
use crate::ownership::OwnershipMap;
use crate::policy::ApprovalPolicy;
use crate::suggest::{suggest_approvers, SuggestInput};
use crate::tips::{reconcile, render, ApproveTips};

/// Everything besides comment history that a review needs.
pub struct ReviewContext<'a> {
    pub request: &'a ChangeRequest,
    pub ownership: &'a OwnershipMap,
    pub policy: &'a ApprovalPolicy,
    pub bot: &'a Login,
    /// Label whose presence means CI passed, when CI labels are enabled.
    pub ci_passed_label: Option<&'a str>,
    /// CI was just reported passing by the triggering event.
    pub ci_passed: bool,
    /// Command carried by the triggering comment, if any.
    pub trigger: Option<Command>,
}

impl ReviewContext<'_> {
    fn ci_ok(&self) -> bool {
        self.ci_passed
            || self
                .ci_passed_label
                .is_some_and(|label| self.request.labels.has(label))
    }

    /// Suggestions are regenerated only once CI passed, and then only while
    /// the tips comment lacks them or when someone just approved.
    fn should_suggest(&self, tips: &ApproveTips) -> bool {
        self.ci_ok()
            && (!tips.exists()
                || !tips.has_suggestions()
                || self.trigger == Some(Command::Approve))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewPlan {
    pub consensus: Consensus,
    pub effects: Vec<Effect>,
}

/// Plan the writes for one review invocation.
///
/// `code_updated_at` is the last update time of the head commit; only
/// comments strictly newer than it may vote. Label effects come first,
/// followed by at most one tips effect.
pub fn plan_review(
    ctx: &ReviewContext<'_>,
    comments: &[Comment],
    code_updated_at: DateTime<Utc>,
) -> ReviewPlan {
    let request = ctx.request;
    let eligible = eligible_comments(comments, code_updated_at, ctx.bot);
    let consensus = compute(&eligible, &request.author, ctx.ownership, ctx.policy);

    debug!(
        "Consensus for {} from {} eligible comments: {:?}",
        request.pr,
        eligible.len(),
        consensus.decision
    );

    let mut effects = label_effects(consensus.decision, &request.labels);

    let tips = ApproveTips::find(comments, ctx.bot);
    let suggested = if consensus.decision == Decision::Lgtm && ctx.should_suggest(&tips) {
        Some(suggest_approvers(&SuggestInput {
            current_approvers: &consensus.evidence.approved,
            assignees: &request.assignees,
            author: &request.author,
            ownership: ctx.ownership,
            policy: ctx.policy,
        }))
    } else {
        None
    };

    let body = render(&consensus, suggested.as_deref(), &tips);
    effects.extend(reconcile(&body, &tips));

    ReviewPlan { consensus, effects }
}
