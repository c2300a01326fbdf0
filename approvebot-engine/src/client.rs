//! Collaborators the orchestrator talks to.
//!
//! The hosting service is the only source of truth: every invocation reads
//! a fresh snapshot through [`HostingClient`] and writes the resulting delta
//! back through it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use approvebot_core::{ChangeRequest, Comment, CommentId, OwnershipMap, PrRef};

#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Current metadata and labels of a change request.
    async fn get_change_request(&self, pr: &PrRef) -> Result<ChangeRequest>;

    /// Full comment history, in the order the service lists it.
    async fn list_comments(&self, pr: &PrRef) -> Result<Vec<Comment>>;

    /// Last time the given head commit was updated on the request.
    async fn code_update_time(&self, pr: &PrRef, head_sha: &str) -> Result<DateTime<Utc>>;

    async fn create_comment(&self, pr: &PrRef, body: &str) -> Result<CommentId>;

    async fn update_comment(&self, pr: &PrRef, id: CommentId, body: &str) -> Result<()>;

    async fn delete_comment(&self, pr: &PrRef, id: CommentId) -> Result<()>;

    /// Add several labels in one call.
    async fn add_labels(&self, pr: &PrRef, labels: &[String]) -> Result<()>;

    async fn remove_label(&self, pr: &PrRef, label: &str) -> Result<()>;
}

#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// Directory approvers and reviewers for the given paths on a base branch.
    async fn resolve(&self, pr: &PrRef, base_branch: &str, paths: &[String])
        -> Result<OwnershipMap>;
}
