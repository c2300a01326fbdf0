//! Snapshot types for a change request and its comment history.
//!
//! Everything here is a read-only projection of hosting-service state taken
//! once per invocation. Nothing is cached across invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Newtype for a hosting-service login.
///
/// Logins compare case-insensitively and ignore a leading `@`, so `@Alice`
/// and `alice` are the same identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Login(String);

impl Login {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().trim_start_matches('@').to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Login {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for Login {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Login> for String {
    fn from(login: Login) -> Self {
        login.0
    }
}

/// Newtype for a hosting-service comment ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub u64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CommentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifies a change request across repositories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrRef {
    pub org: String,
    pub repo: String,
    pub number: u64,
}

impl PrRef {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for PrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    #[default]
    Open,
    Closed,
    Merged,
}

/// The set of labels currently present on a change request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeSet<String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        self.0.insert(label.into())
    }

    pub fn remove(&mut self, label: &str) -> bool {
        self.0.remove(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Immutable snapshot of a change request for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub pr: PrRef,
    pub author: Login,
    pub base_branch: String,
    pub head_sha: String,
    #[serde(default)]
    pub state: PrState,
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub changed_files: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<Login>,
}

impl ChangeRequest {
    /// Only open requests take part in review.
    pub fn is_reviewable(&self) -> bool {
        self.state == PrState::Open
    }
}

/// A comment from the hosting service's history for a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: Login,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_normalises_case_and_at_sign() {
        assert_eq!(Login::new("@Alice"), Login::new("alice"));
        assert_eq!(Login::new("  BOB "), Login::from("bob"));
        assert_eq!(Login::new("@carol").to_string(), "carol");
    }

    #[test]
    fn test_label_set_membership() {
        let mut labels: LabelSet = ["lgtm", "can-review"].into_iter().collect();
        assert!(labels.has("lgtm"));
        assert!(!labels.has("approved"));
        assert!(labels.remove("lgtm"));
        assert!(!labels.remove("lgtm"));
        assert!(labels.insert("approved"));
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["approved", "can-review"]);
    }

    #[test]
    fn test_only_open_requests_are_reviewable() {
        let mut cr = ChangeRequest {
            pr: PrRef::new("org", "repo", 1),
            author: Login::new("author"),
            base_branch: "main".to_string(),
            head_sha: "abc".to_string(),
            state: PrState::Open,
            labels: LabelSet::new(),
            changed_files: vec![],
            assignees: vec![],
        };
        assert!(cr.is_reviewable());
        cr.state = PrState::Merged;
        assert!(!cr.is_reviewable());
    }

    #[test]
    fn test_pr_ref_display() {
        assert_eq!(PrRef::new("org", "repo", 42).to_string(), "org/repo#42");
    }
}
