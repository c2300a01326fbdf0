//! Directory ownership for the files touched by a change request.
//!
//! The map is produced by an external resolver and is read-only here. It
//! keeps both directions so that "who can approve this directory" and "which
//! directories does this approver cover" are both cheap lookups.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::Login;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipMap {
    dir_approvers: BTreeMap<String, BTreeSet<Login>>,
    approver_dirs: BTreeMap<Login, BTreeSet<String>>,
    dir_reviewers: BTreeMap<String, BTreeSet<Login>>,
}

impl OwnershipMap {
    pub fn new(
        dir_approvers: BTreeMap<String, BTreeSet<Login>>,
        dir_reviewers: BTreeMap<String, BTreeSet<Login>>,
    ) -> Self {
        let mut approver_dirs: BTreeMap<Login, BTreeSet<String>> = BTreeMap::new();
        for (dir, approvers) in &dir_approvers {
            for approver in approvers {
                approver_dirs
                    .entry(approver.clone())
                    .or_default()
                    .insert(dir.clone());
            }
        }

        Self {
            dir_approvers,
            approver_dirs,
            dir_reviewers,
        }
    }

    /// Touched directories that have approvers, in lexicographic order.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.dir_approvers.keys().map(String::as_str)
    }

    pub fn approvers_of(&self, dir: &str) -> Option<&BTreeSet<Login>> {
        self.dir_approvers.get(dir)
    }

    pub fn is_approver(&self, login: &Login) -> bool {
        self.approver_dirs.contains_key(login)
    }

    /// Directories this login may approve. Empty for non-approvers.
    pub fn dirs_of_approver(&self, login: &Login) -> impl Iterator<Item = &str> {
        self.approver_dirs
            .get(login)
            .into_iter()
            .flat_map(|dirs| dirs.iter().map(String::as_str))
    }

    /// Directory to reviewer-set pairs for the touched directories.
    pub fn reviewers(&self) -> impl Iterator<Item = (&str, &BTreeSet<Login>)> {
        self.dir_reviewers
            .iter()
            .map(|(dir, reviewers)| (dir.as_str(), reviewers))
    }
}
