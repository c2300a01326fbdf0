//! Reviewer and approver suggestions.
//!
//! Ordering is fully determined by the inputs: ties are broken by login in
//! lexicographic order.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::consensus::{approvals_satisfied, uncovered_directories};
use crate::model::Login;
use crate::ownership::OwnershipMap;
use crate::policy::ApprovalPolicy;

/// Inputs for approver suggestion.
///
/// `ownership` is already scoped to the change request's changed files.
pub struct SuggestInput<'a> {
    pub current_approvers: &'a [Login],
    pub assignees: &'a [Login],
    pub author: &'a Login,
    pub ownership: &'a OwnershipMap,
    pub policy: &'a ApprovalPolicy,
}

/// Suggest approvers who would move the change request toward approval.
///
/// Candidates are the approvers of every directory still lacking an approval
/// (or of every directory, when all are covered but the approver count falls
/// short). Ranked by assignee first, then by how many of those directories
/// they can approve, then by login.
pub fn suggest_approvers(input: &SuggestInput<'_>) -> Vec<Login> {
    let SuggestInput {
        current_approvers,
        assignees,
        author,
        ownership,
        policy,
    } = *input;

    if approvals_satisfied(current_approvers, ownership, policy) {
        return Vec::new();
    }

    let uncovered = uncovered_directories(current_approvers, ownership);
    let targets: Vec<&str> = if uncovered.is_empty() {
        ownership.directories().collect()
    } else {
        uncovered
    };

    let mut coverage: BTreeMap<&Login, usize> = BTreeMap::new();
    for dir in &targets {
        for approver in ownership.approvers_of(dir).into_iter().flatten() {
            if current_approvers.contains(approver) {
                continue;
            }
            if approver == author && !policy.allow_self_approve {
                continue;
            }
            *coverage.entry(approver).or_default() += 1;
        }
    }

    let mut candidates: Vec<(&Login, usize)> = coverage.into_iter().collect();
    candidates.sort_by_key(|(login, covered)| {
        (!assignees.contains(login), Reverse(*covered), (*login).clone())
    });

    candidates
        .into_iter()
        .take(policy.max_suggested_approvers)
        .map(|(login, _)| login.clone())
        .collect()
}

/// Suggest reviewers for a freshly opened or updated change request.
///
/// Reviewers of more touched directories come first; the author is never suggested.
pub fn suggest_reviewers(author: &Login, ownership: &OwnershipMap, limit: usize) -> Vec<Login> {
    let mut coverage: BTreeMap<&Login, usize> = BTreeMap::new();
    for (_, reviewers) in ownership.reviewers() {
        for reviewer in reviewers.iter().filter(|r| *r != author) {
            *coverage.entry(reviewer).or_default() += 1;
        }
    }

    let mut candidates: Vec<(&Login, usize)> = coverage.into_iter().collect();
    candidates.sort_by_key(|(login, covered)| (Reverse(*covered), (*login).clone()));

    candidates
        .into_iter()
        .take(limit)
        .map(|(login, _)| login.clone())
        .collect()
}
