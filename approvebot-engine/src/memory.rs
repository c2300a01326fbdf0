//! In-memory collaborators.
//!
//! `InMemoryHost` behaves like a hosting service holding change requests,
//! their labels and comments, and records every write it receives so tests
//! and the simulator can inspect exactly what an invocation did. Writes can
//! be made to fail by matching their description.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;

use approvebot_core::{ChangeRequest, Comment, CommentId, LabelSet, Login, OwnershipMap, PrRef};

use crate::client::{HostingClient, OwnershipResolver};

/// A write received by [`InMemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Write {
    CreateComment { id: CommentId, body: String },
    UpdateComment { id: CommentId, body: String },
    DeleteComment { id: CommentId },
    AddLabels { labels: Vec<String> },
    RemoveLabel { label: String },
}

impl fmt::Display for Write {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Write::CreateComment { body, .. } => write!(f, "create comment {}", body),
            Write::UpdateComment { id, body } => write!(f, "update comment {} {}", id, body),
            Write::DeleteComment { id } => write!(f, "delete comment {}", id),
            Write::AddLabels { labels } => write!(f, "add labels {}", labels.join(", ")),
            Write::RemoveLabel { label } => write!(f, "remove label {}", label),
        }
    }
}

struct HeadCommit {
    sha: String,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct HostState {
    requests: HashMap<PrRef, ChangeRequest>,
    comments: HashMap<PrRef, Vec<Comment>>,
    heads: HashMap<PrRef, HeadCommit>,
    next_comment_id: u64,
    now: DateTime<Utc>,
    writes: Vec<Write>,
    fail_reads: bool,
    failing_writes: Vec<String>,
}

impl HostState {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = self.now;
        self.now += Duration::seconds(1);
        now
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads {
            bail!("hosting service unavailable");
        }
        Ok(())
    }

    /// Record the write, or fail it when it matches an injected failure.
    fn record(&mut self, write: Write) -> Result<()> {
        let description = write.to_string();
        if let Some(pattern) = self
            .failing_writes
            .iter()
            .find(|p| description.contains(p.as_str()))
        {
            bail!("injected failure ({}) for {}", pattern, description);
        }
        self.writes.push(write);
        Ok(())
    }

    fn request_mut(&mut self, pr: &PrRef) -> Result<&mut ChangeRequest> {
        self.requests
            .get_mut(pr)
            .ok_or_else(|| anyhow!("unknown pull request {}", pr))
    }

    fn comments_mut(&mut self, pr: &PrRef) -> &mut Vec<Comment> {
        self.comments.entry(pr.clone()).or_default()
    }

    fn next_id(&mut self) -> CommentId {
        self.next_comment_id += 1;
        CommentId(self.next_comment_id)
    }
}

/// A change request, its comment history and head-commit time, as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub request: ChangeRequest,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub code_updated_at: DateTime<Utc>,
    /// Clock used for comments created during the run; defaults to one
    /// second after the latest known timestamp.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

pub struct InMemoryHost {
    bot: Login,
    state: RwLock<HostState>,
}

impl InMemoryHost {
    pub fn new(bot: Login, now: DateTime<Utc>) -> Self {
        Self {
            bot,
            state: RwLock::new(HostState {
                now,
                ..HostState::default()
            }),
        }
    }

    pub fn from_snapshot(bot: Login, snapshot: HostSnapshot) -> Self {
        let latest = snapshot
            .comments
            .iter()
            .map(|c| c.created_at)
            .chain([snapshot.code_updated_at])
            .max()
            .unwrap_or(snapshot.code_updated_at);
        let now = snapshot.now.unwrap_or(latest + Duration::seconds(1));

        let pr = snapshot.request.pr.clone();
        let next_comment_id = snapshot.comments.iter().map(|c| c.id.0).max().unwrap_or(0);

        let mut state = HostState {
            now,
            next_comment_id,
            ..HostState::default()
        };
        state.heads.insert(
            pr.clone(),
            HeadCommit {
                sha: snapshot.request.head_sha.clone(),
                updated_at: snapshot.code_updated_at,
            },
        );
        state.comments.insert(pr.clone(), snapshot.comments);
        state.requests.insert(pr, snapshot.request);

        Self {
            bot,
            state: RwLock::new(state),
        }
    }

    /// Register a change request whose head commit was updated at the current time.
    pub async fn open(&self, request: ChangeRequest) {
        let mut state = self.state.write().await;
        let updated_at = state.tick();
        state.heads.insert(
            request.pr.clone(),
            HeadCommit {
                sha: request.head_sha.clone(),
                updated_at,
            },
        );
        state.requests.insert(request.pr.clone(), request);
    }

    /// Move the head to a new commit updated at the current time.
    pub async fn push(&self, pr: &PrRef, sha: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let updated_at = state.tick();
        state.request_mut(pr)?.head_sha = sha.to_string();
        state.heads.insert(
            pr.clone(),
            HeadCommit {
                sha: sha.to_string(),
                updated_at,
            },
        );
        Ok(())
    }

    /// Post a comment as someone other than the bot. Not recorded as a write.
    pub async fn post(&self, pr: &PrRef, author: &str, body: &str) -> Comment {
        let mut state = self.state.write().await;
        let comment = Comment {
            id: state.next_id(),
            author: Login::new(author),
            created_at: state.tick(),
            body: body.to_string(),
        };
        state.comments_mut(pr).push(comment.clone());
        comment
    }

    /// Change labels out of band, as a CI system or a human would.
    pub async fn set_label(&self, pr: &PrRef, label: &str, present: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let labels = &mut state.request_mut(pr)?.labels;
        if present {
            labels.insert(label);
        } else {
            labels.remove(label);
        }
        Ok(())
    }

    pub async fn labels(&self, pr: &PrRef) -> LabelSet {
        let state = self.state.read().await;
        state
            .requests
            .get(pr)
            .map(|r| r.labels.clone())
            .unwrap_or_default()
    }

    pub async fn comments(&self, pr: &PrRef) -> Vec<Comment> {
        let state = self.state.read().await;
        state.comments.get(pr).cloned().unwrap_or_default()
    }

    pub async fn writes(&self) -> Vec<Write> {
        self.state.read().await.writes.clone()
    }

    /// Return and forget the writes recorded so far.
    pub async fn take_writes(&self) -> Vec<Write> {
        std::mem::take(&mut self.state.write().await.writes)
    }

    pub async fn fail_reads(&self, fail: bool) {
        self.state.write().await.fail_reads = fail;
    }

    /// Fail every write whose description contains `pattern`,
    /// e.g. `"remove label lgtm"` or `"create comment"`.
    pub async fn fail_writes_matching(&self, pattern: &str) {
        self.state
            .write()
            .await
            .failing_writes
            .push(pattern.to_string());
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.fail_reads = false;
        state.failing_writes.clear();
    }
}

#[async_trait]
impl HostingClient for InMemoryHost {
    async fn get_change_request(&self, pr: &PrRef) -> Result<ChangeRequest> {
        let state = self.state.read().await;
        state.check_reads()?;
        state
            .requests
            .get(pr)
            .cloned()
            .ok_or_else(|| anyhow!("unknown pull request {}", pr))
    }

    async fn list_comments(&self, pr: &PrRef) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        state.check_reads()?;
        Ok(state.comments.get(pr).cloned().unwrap_or_default())
    }

    async fn code_update_time(&self, pr: &PrRef, head_sha: &str) -> Result<DateTime<Utc>> {
        let state = self.state.read().await;
        state.check_reads()?;
        let head = state
            .heads
            .get(pr)
            .with_context(|| format!("no commits known for {}", pr))?;
        if head.sha != head_sha {
            bail!("commit {} is not the head of {}", head_sha, pr);
        }
        Ok(head.updated_at)
    }

    async fn create_comment(&self, pr: &PrRef, body: &str) -> Result<CommentId> {
        let mut state = self.state.write().await;
        let id = CommentId(state.next_comment_id + 1);
        state.record(Write::CreateComment {
            id,
            body: body.to_string(),
        })?;
        state.next_comment_id = id.0;
        let comment = Comment {
            id,
            author: self.bot.clone(),
            created_at: state.tick(),
            body: body.to_string(),
        };
        state.comments_mut(pr).push(comment);
        Ok(id)
    }

    async fn update_comment(&self, pr: &PrRef, id: CommentId, body: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.record(Write::UpdateComment {
            id,
            body: body.to_string(),
        })?;
        let comment = state
            .comments_mut(pr)
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("comment {} not found on {}", id, pr))?;
        comment.body = body.to_string();
        Ok(())
    }

    async fn delete_comment(&self, pr: &PrRef, id: CommentId) -> Result<()> {
        let mut state = self.state.write().await;
        state.record(Write::DeleteComment { id })?;
        state.comments_mut(pr).retain(|c| c.id != id);
        Ok(())
    }

    async fn add_labels(&self, pr: &PrRef, labels: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        state.record(Write::AddLabels {
            labels: labels.to_vec(),
        })?;
        let request = state.request_mut(pr)?;
        for label in labels {
            request.labels.insert(label.clone());
        }
        Ok(())
    }

    async fn remove_label(&self, pr: &PrRef, label: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.record(Write::RemoveLabel {
            label: label.to_string(),
        })?;
        state.request_mut(pr)?.labels.remove(label);
        Ok(())
    }
}

/// Ownership declared per directory, resolved by longest matching prefix.
///
/// The directory `"."` matches every path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticOwnership {
    #[serde(default)]
    pub approvers: BTreeMap<String, Vec<Login>>,
    #[serde(default)]
    pub reviewers: BTreeMap<String, Vec<Login>>,
}

fn owning_dir<'a>(table: &'a BTreeMap<String, Vec<Login>>, path: &str) -> Option<&'a str> {
    table
        .keys()
        .filter(|dir| {
            let dir = dir.trim_end_matches('/');
            dir == "." || path == dir || path.starts_with(&format!("{}/", dir))
        })
        .max_by_key(|dir| if dir.as_str() == "." { 0 } else { dir.len() })
        .map(String::as_str)
}

fn resolve_table(
    table: &BTreeMap<String, Vec<Login>>,
    paths: &[String],
) -> BTreeMap<String, BTreeSet<Login>> {
    let mut resolved = BTreeMap::new();
    for path in paths {
        if let Some(dir) = owning_dir(table, path) {
            let owners = table.get(dir).into_iter().flatten().cloned();
            resolved
                .entry(dir.to_string())
                .or_insert_with(BTreeSet::new)
                .extend(owners);
        }
    }
    resolved.retain(|_, owners: &mut BTreeSet<Login>| !owners.is_empty());
    resolved
}

impl StaticOwnership {
    pub fn resolve_paths(&self, paths: &[String]) -> OwnershipMap {
        OwnershipMap::new(
            resolve_table(&self.approvers, paths),
            resolve_table(&self.reviewers, paths),
        )
    }
}

#[async_trait]
impl OwnershipResolver for StaticOwnership {
    async fn resolve(
        &self,
        _pr: &PrRef,
        _base_branch: &str,
        paths: &[String],
    ) -> Result<OwnershipMap> {
        Ok(self.resolve_paths(paths))
    }
}
