//! The review trigger: turns one event into hosting-service writes.
//!
//! Every invocation reads a fresh snapshot (request, comments, head-commit
//! time, ownership), plans against it, and only then writes. A failed read
//! aborts before anything is written. Failed writes are collected and
//! reported together once every planned write has been attempted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use approvebot_core::labels::{push_effects, CAN_REVIEW};
use approvebot_core::tips::ApproveTips;
use approvebot_core::{
    parse_comment, plan_review, suggest_reviewers, ChangeRequest, Command, Comment, Consensus,
    Effect, Login, OwnershipMap, ReviewContext,
};

use crate::client::{HostingClient, OwnershipResolver};
use crate::config::{RepoConfig, TriggerConfig};
use crate::error::TriggerError;
use crate::event::{Event, EventKind};
use crate::interpreter::execute_effects;

/// What handling an event amounted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Ignored { reason: String },
    Opened,
    Synchronized,
    Reviewed { consensus: Consensus },
}

impl Outcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }
}

pub struct ReviewTrigger<H, O> {
    client: Arc<H>,
    ownership: Arc<O>,
    config: TriggerConfig,
}

impl<H, O> ReviewTrigger<H, O>
where
    H: HostingClient,
    O: OwnershipResolver,
{
    pub fn new(client: Arc<H>, ownership: Arc<O>, config: TriggerConfig) -> Self {
        Self {
            client,
            ownership,
            config,
        }
    }

    pub async fn handle_event(&self, event: &Event) -> Result<Outcome, TriggerError> {
        let pr = &event.pr;
        let repo_config = self.config.config_for(&pr.org, &pr.repo)?;
        let bot = self.config.bot();

        let trigger = match &event.kind {
            EventKind::CommentCreated { comment } => {
                if comment.author == bot {
                    return Ok(Outcome::ignored("comment written by the bot"));
                }
                match parse_comment(&comment.body) {
                    Some(command) => Some(command),
                    None => return Ok(Outcome::ignored("comment carries no command")),
                }
            }
            _ => None,
        };

        let request = self
            .client
            .get_change_request(pr)
            .await
            .map_err(|e| TriggerError::read("pull request", e))?;

        if !request.is_reviewable() {
            debug!("Ignoring event on PR #{} in {}/{}: not open", pr.number, pr.org, pr.repo);
            return Ok(Outcome::ignored("pull request is not open"));
        }

        match &event.kind {
            EventKind::PullRequestOpened => {
                info!("Handling opened PR #{} in {}/{}", pr.number, pr.org, pr.repo);
                self.handle_opened(&request, repo_config, &bot).await
            }
            EventKind::PullRequestSynchronized => {
                info!(
                    "Handling push to PR #{} in {}/{} (head {})",
                    pr.number, pr.org, pr.repo, request.head_sha
                );
                self.handle_synchronized(&request, repo_config, &bot).await
            }
            EventKind::CommentCreated { comment } => {
                info!(
                    "Handling comment {} from {} on PR #{} in {}/{}",
                    comment.id, comment.author, pr.number, pr.org, pr.repo
                );
                self.handle(&request, repo_config, &bot, false, trigger)
                    .await
            }
            EventKind::CiStatusChanged { passed } => {
                info!(
                    "Handling CI status (passed: {}) on PR #{} in {}/{}",
                    passed, pr.number, pr.org, pr.repo
                );
                self.handle(&request, repo_config, &bot, *passed, None).await
            }
        }
    }

    async fn code_update_time(
        &self,
        request: &ChangeRequest,
    ) -> Result<DateTime<Utc>, TriggerError> {
        self.client
            .code_update_time(&request.pr, &request.head_sha)
            .await
            .map_err(|e| TriggerError::read("code update time", e))
    }

    async fn comments(&self, request: &ChangeRequest) -> Result<Vec<Comment>, TriggerError> {
        self.client
            .list_comments(&request.pr)
            .await
            .map_err(|e| TriggerError::read("comments", e))
    }

    async fn resolve_ownership(&self, request: &ChangeRequest) -> Result<OwnershipMap, TriggerError> {
        self.ownership
            .resolve(&request.pr, &request.base_branch, &request.changed_files)
            .await
            .map_err(|e| TriggerError::read("ownership", e))
    }

    fn reviewer_suggestion(
        &self,
        request: &ChangeRequest,
        ownership: &OwnershipMap,
        repo_config: &RepoConfig,
    ) -> Option<Effect> {
        let reviewers = suggest_reviewers(
            &request.author,
            ownership,
            repo_config.reviewers.total_number,
        );
        let first = reviewers.first()?;
        let mentions: Vec<String> = reviewers.iter().map(|r| format!("@{}", r)).collect();

        Some(Effect::CreateComment {
            body: format!(
                "@{}, suggests these reviewers( {} ) to review your code. You can ask one of them by writing `@{}` in a comment",
                request.author,
                mentions.join(", "),
                first
            ),
        })
    }

    fn welcome(&self) -> String {
        format!(
            "Thank you for your pull request.\n\nThe full list of commands accepted by me can be found at [**here**]({}).",
            self.config.commands_link
        )
    }

    async fn handle_opened(
        &self,
        request: &ChangeRequest,
        repo_config: &RepoConfig,
        bot: &Login,
    ) -> Result<Outcome, TriggerError> {
        let comments = self.comments(request).await?;
        let ownership = self.resolve_ownership(request).await?;

        let mut effects = Vec::new();
        if !request.labels.has(CAN_REVIEW) {
            effects.push(Effect::AddLabels {
                labels: vec![CAN_REVIEW.to_string()],
                announcement: None,
            });
        }

        // A re-delivered open event must not greet twice.
        let welcome = self.welcome();
        let greeted = comments
            .iter()
            .any(|c| &c.author == bot && c.body == welcome);
        if !greeted {
            effects.push(Effect::CreateComment { body: welcome });
            effects.extend(self.reviewer_suggestion(request, &ownership, repo_config));
        }

        execute_effects(self.client.as_ref(), &request.pr, effects)
            .await
            .into_result()?;
        Ok(Outcome::Opened)
    }

    async fn handle_synchronized(
        &self,
        request: &ChangeRequest,
        repo_config: &RepoConfig,
        bot: &Login,
    ) -> Result<Outcome, TriggerError> {
        let code_updated_at = self.code_update_time(request).await?;
        let comments = self.comments(request).await?;
        let ownership = self.resolve_ownership(request).await?;

        let mut effects = push_effects(&request.labels, &repo_config.ci_labels());

        // A re-delivered push must not suggest the same reviewers for the same head twice.
        if let Some(suggestion) = self.reviewer_suggestion(request, &ownership, repo_config) {
            let suggested = matches!(&suggestion, Effect::CreateComment { body } if comments
                .iter()
                .any(|c| &c.author == bot && c.created_at > code_updated_at && &c.body == body));
            if !suggested {
                effects.push(suggestion);
            }
        }

        if let Some(id) = ApproveTips::find(&comments, bot).id {
            effects.push(Effect::DeleteComment { id });
        }

        execute_effects(self.client.as_ref(), &request.pr, effects)
            .await
            .into_result()?;
        Ok(Outcome::Synchronized)
    }

    /// Recompute consensus from comment history and converge labels and tips on it.
    async fn handle(
        &self,
        request: &ChangeRequest,
        repo_config: &RepoConfig,
        bot: &Login,
        ci_passed: bool,
        trigger: Option<Command>,
    ) -> Result<Outcome, TriggerError> {
        let pr = &request.pr;

        let code_updated_at = self.code_update_time(request).await?;
        let comments = self.comments(request).await?;
        let ownership = self.resolve_ownership(request).await?;
        let policy = repo_config.policy();

        let ctx = ReviewContext {
            request,
            ownership: &ownership,
            policy: &policy,
            bot,
            ci_passed_label: repo_config.ci_passed_label(),
            ci_passed,
            trigger,
        };
        let plan = plan_review(&ctx, &comments, code_updated_at);

        info!(
            "PR #{} in {}/{}: decision {:?}, {} write(s) planned",
            pr.number,
            pr.org,
            pr.repo,
            plan.consensus.decision,
            plan.effects.len()
        );

        let errors = execute_effects(self.client.as_ref(), pr, plan.effects).await;
        if !errors.is_empty() {
            warn!(
                "{} write(s) failed on PR #{} in {}/{}",
                errors.len(),
                pr.number,
                pr.org,
                pr.repo
            );
        }
        errors.into_result()?;

        Ok(Outcome::Reviewed {
            consensus: plan.consensus,
        })
    }
}
