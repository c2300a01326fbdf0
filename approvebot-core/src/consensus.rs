//! Consensus over the review and approval votes of a change request.
//!
//! Votes are rebuilt from comment history on every invocation:
//! 1. Comments older than the head commit's last update are discarded.
//! 2. Each remaining comment contributes at most one vote.
//! 3. A later vote from the same identity on the same axis replaces the earlier one.
//! 4. The decision is the first rule in [`DECISION_RULES`] that matches.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::command::{parse_comment, Axis, Command};
use crate::model::{Comment, Login};
use crate::ownership::OwnershipMap;
use crate::policy::{ApprovalMode, ApprovalPolicy};

/// The label a change request should carry according to its votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    None,
    Lgtm,
    RequestChange,
    Approved,
}

/// Filter comment history down to the comments that may vote.
///
/// Keeps comments created strictly after `since` (the head commit's last
/// update), not written by the bot, and carrying a recognised command.
/// The result is in chronological order; ties keep their listing order.
pub fn eligible_comments<'a>(
    comments: &'a [Comment],
    since: DateTime<Utc>,
    bot: &Login,
) -> Vec<&'a Comment> {
    let mut eligible: Vec<&Comment> = comments
        .iter()
        .filter(|c| c.created_at > since)
        .filter(|c| &c.author != bot)
        .filter(|c| parse_comment(&c.body).is_some())
        .collect();
    eligible.sort_by_key(|c| c.created_at);
    eligible
}

/// The review axis ignores the author's own votes, always.
fn counts_on_review_axis(voter: &Login, author: &Login) -> bool {
    voter != author
}

/// The approval axis only hears directory approvers. An approver who wrote
/// the change may reject it, but may approve it only when self-approval is
/// enabled.
fn counts_on_approval_axis(
    voter: &Login,
    command: Command,
    author: &Login,
    ownership: &OwnershipMap,
    allow_self_approve: bool,
) -> bool {
    if !ownership.is_approver(voter) {
        return false;
    }
    match command {
        Command::Reject => true,
        Command::Approve => voter != author || allow_self_approve,
        Command::Agree | Command::Disagree => false,
    }
}

/// Latest live vote per identity on each axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    review: BTreeMap<Login, Command>,
    approval: BTreeMap<Login, Command>,
}

impl Tally {
    /// Build the tally from chronologically ordered comments.
    pub fn from_comments(
        comments: &[&Comment],
        author: &Login,
        ownership: &OwnershipMap,
        allow_self_approve: bool,
    ) -> Self {
        let mut tally = Tally::default();

        for comment in comments {
            let Some(command) = parse_comment(&comment.body) else {
                continue;
            };
            let voter = &comment.author;

            match command.axis() {
                Axis::Review => {
                    if counts_on_review_axis(voter, author) {
                        tally.review.insert(voter.clone(), command);
                    }
                }
                Axis::Approval => {
                    if counts_on_approval_axis(
                        voter,
                        command,
                        author,
                        ownership,
                        allow_self_approve,
                    ) {
                        tally.approval.insert(voter.clone(), command);
                    }
                }
            }
        }

        tally
    }

    fn voters(votes: &BTreeMap<Login, Command>, wanted: Command) -> Vec<Login> {
        votes
            .iter()
            .filter(|(_, command)| **command == wanted)
            .map(|(login, _)| login.clone())
            .collect()
    }

    pub fn agreed(&self) -> Vec<Login> {
        Self::voters(&self.review, Command::Agree)
    }

    pub fn disagreed(&self) -> Vec<Login> {
        Self::voters(&self.review, Command::Disagree)
    }

    pub fn approved(&self) -> Vec<Login> {
        Self::voters(&self.approval, Command::Approve)
    }

    pub fn rejected(&self) -> Vec<Login> {
        Self::voters(&self.approval, Command::Reject)
    }

    fn has(votes: &BTreeMap<Login, Command>, wanted: Command) -> bool {
        votes.values().any(|command| *command == wanted)
    }
}

/// Who voted what, each list in lexicographic login order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evidence {
    pub agreed: Vec<Login>,
    pub disagreed: Vec<Login>,
    pub approved: Vec<Login>,
    pub rejected: Vec<Login>,
}

impl From<&Tally> for Evidence {
    fn from(tally: &Tally) -> Self {
        Self {
            agreed: tally.agreed(),
            disagreed: tally.disagreed(),
            approved: tally.approved(),
            rejected: tally.rejected(),
        }
    }
}

/// Touched directories none of `approvers` can approve, in lexicographic order.
pub fn uncovered_directories<'a>(approvers: &[Login], ownership: &'a OwnershipMap) -> Vec<&'a str> {
    ownership
        .directories()
        .filter(|dir| {
            !ownership
                .approvers_of(dir)
                .is_some_and(|owners| approvers.iter().any(|a| owners.contains(a)))
        })
        .collect()
}

/// Whether the given approving identities are enough to merge.
pub fn approvals_satisfied(
    approvers: &[Login],
    ownership: &OwnershipMap,
    policy: &ApprovalPolicy,
) -> bool {
    if approvers.is_empty() {
        return false;
    }

    let enough = approvers.len() >= policy.required_approvers();
    let covered = uncovered_directories(approvers, ownership).is_empty();

    match policy.mode {
        ApprovalMode::Count => enough,
        ApprovalMode::Coverage => covered,
        ApprovalMode::CountAndCoverage => enough && covered,
    }
}

/// Inputs every decision rule sees.
pub struct RuleInput<'a> {
    pub tally: &'a Tally,
    pub ownership: &'a OwnershipMap,
    pub policy: &'a ApprovalPolicy,
}

fn requests_change(input: &RuleInput<'_>) -> bool {
    let tally = input.tally;
    Tally::has(&tally.approval, Command::Reject)
        || (Tally::has(&tally.review, Command::Disagree)
            && !Tally::has(&tally.approval, Command::Approve))
}

fn approved(input: &RuleInput<'_>) -> bool {
    approvals_satisfied(&input.tally.approved(), input.ownership, input.policy)
}

/// An approval that falls short of the threshold still says the code looks good.
fn looks_good(input: &RuleInput<'_>) -> bool {
    Tally::has(&input.tally.review, Command::Agree)
        || Tally::has(&input.tally.approval, Command::Approve)
}

/// Decision rules in priority order. The first match wins; no match is [`Decision::None`].
pub const DECISION_RULES: [(Decision, fn(&RuleInput<'_>) -> bool); 3] = [
    (Decision::RequestChange, requests_change),
    (Decision::Approved, approved),
    (Decision::Lgtm, looks_good),
];

pub fn decide(input: &RuleInput<'_>) -> Decision {
    DECISION_RULES
        .iter()
        .find(|(_, rule)| rule(input))
        .map(|(decision, _)| *decision)
        .unwrap_or(Decision::None)
}

/// Decision plus the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consensus {
    pub decision: Decision,
    pub evidence: Evidence,
}

/// Compute consensus from eligible, chronologically ordered comments.
pub fn compute(
    comments: &[&Comment],
    author: &Login,
    ownership: &OwnershipMap,
    policy: &ApprovalPolicy,
) -> Consensus {
    let tally = Tally::from_comments(comments, author, ownership, policy.allow_self_approve);
    let decision = decide(&RuleInput {
        tally: &tally,
        ownership,
        policy,
    });

    Consensus {
        decision,
        evidence: Evidence::from(&tally),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    const AUTHOR: &str = "author";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn comment(id: u64, author: &str, secs: i64, body: &str) -> Comment {
        Comment {
            id: id.into(),
            author: Login::new(author),
            created_at: at(secs),
            body: body.to_string(),
        }
    }

    fn ownership(dirs: &[(&str, &[&str])]) -> OwnershipMap {
        OwnershipMap::new(
            dirs.iter()
                .map(|(dir, owners)| {
                    (
                        dir.to_string(),
                        owners.iter().map(|o| Login::new(o)).collect::<BTreeSet<_>>(),
                    )
                })
                .collect(),
            BTreeMap::new(),
        )
    }

    fn default_owners() -> OwnershipMap {
        ownership(&[("src", &["alice", "bob", AUTHOR]), ("docs", &["bob"])])
    }

    fn run(comments: &[Comment], owners: &OwnershipMap, policy: &ApprovalPolicy) -> Consensus {
        let refs: Vec<&Comment> = comments.iter().collect();
        compute(&refs, &Login::new(AUTHOR), owners, policy)
    }

    fn logins(names: &[&str]) -> Vec<Login> {
        names.iter().map(|n| Login::new(n)).collect()
    }

    #[test]
    fn test_no_votes_is_none() {
        let result = run(
            &[comment(1, "carol", 1, "thanks")],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::None);
    }

    #[test]
    fn test_single_agree_is_lgtm() {
        let result = run(
            &[comment(1, "carol", 1, "/lgtm")],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::Lgtm);
        assert_eq!(result.evidence.agreed, logins(&["carol"]));
    }

    #[test]
    fn test_author_votes_ignored_on_review_axis() {
        let result = run(
            &[
                comment(1, AUTHOR, 1, "/lgtm"),
                comment(2, AUTHOR, 2, "/lbtm"),
            ],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::None);
        assert!(result.evidence.agreed.is_empty());
        assert!(result.evidence.disagreed.is_empty());
    }

    #[test]
    fn test_author_cannot_self_approve_by_default() {
        let result = run(
            &[comment(1, AUTHOR, 1, "/approve")],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::None);
        assert!(result.evidence.approved.is_empty());
    }

    #[test]
    fn test_author_self_approve_when_allowed() {
        let owners = ownership(&[("src", &[AUTHOR])]);
        let policy = ApprovalPolicy {
            allow_self_approve: true,
            ..ApprovalPolicy::default()
        };
        let result = run(&[comment(1, AUTHOR, 1, "/approve")], &owners, &policy);
        assert_eq!(result.decision, Decision::Approved);
    }

    #[test]
    fn test_author_may_reject_own_change() {
        let result = run(
            &[comment(1, AUTHOR, 1, "/reject")],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::RequestChange);
        assert_eq!(result.evidence.rejected, logins(&[AUTHOR]));
    }

    #[test]
    fn test_non_approver_approval_axis_ignored() {
        let result = run(
            &[
                comment(1, "carol", 1, "/approve"),
                comment(2, "dave", 2, "/reject"),
            ],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::None);
    }

    #[test]
    fn test_later_vote_overwrites_earlier() {
        let result = run(
            &[
                comment(1, "carol", 1, "/lgtm"),
                comment(2, "carol", 2, "/lbtm"),
            ],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::RequestChange);
        assert!(result.evidence.agreed.is_empty());
        assert_eq!(result.evidence.disagreed, logins(&["carol"]));
    }

    #[test]
    fn test_overwrite_uses_creation_time_not_listing_order() {
        let comments = [
            comment(2, "carol", 2, "/lgtm"),
            comment(1, "carol", 1, "/lbtm"),
        ];
        let bot = Login::new("bot");
        let eligible = eligible_comments(&comments, at(0), &bot);
        let result = compute(
            &eligible,
            &Login::new(AUTHOR),
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::Lgtm);
    }

    #[test]
    fn test_axes_are_independent() {
        // bob's /lgtm does not replace his /approve.
        let result = run(
            &[
                comment(1, "bob", 1, "/approve"),
                comment(2, "bob", 2, "/lgtm"),
            ],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::Approved);
        assert_eq!(result.evidence.approved, logins(&["bob"]));
        assert_eq!(result.evidence.agreed, logins(&["bob"]));
    }

    #[test]
    fn test_reject_beats_approvals() {
        let result = run(
            &[
                comment(1, "bob", 1, "/approve"),
                comment(2, "alice", 2, "/approve"),
                comment(3, "alice", 3, "/reject"),
            ],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::RequestChange);
    }

    #[test]
    fn test_disagree_countered_by_approval() {
        let result = run(
            &[
                comment(1, "carol", 1, "/lbtm"),
                comment(2, "bob", 2, "/approve"),
            ],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::Approved);
    }

    #[test]
    fn test_partial_approval_is_lgtm() {
        // alice only covers src; docs is still uncovered.
        let result = run(
            &[comment(1, "alice", 1, "/approve")],
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::Lgtm);
        assert_eq!(result.evidence.approved, logins(&["alice"]));
    }

    #[test]
    fn test_count_mode_ignores_coverage() {
        let policy = ApprovalPolicy {
            mode: ApprovalMode::Count,
            ..ApprovalPolicy::default()
        };
        let result = run(
            &[comment(1, "alice", 1, "/approve")],
            &default_owners(),
            &policy,
        );
        assert_eq!(result.decision, Decision::Approved);
    }

    #[test]
    fn test_count_threshold() {
        let policy = ApprovalPolicy {
            number_of_approvers: 2,
            mode: ApprovalMode::Count,
            ..ApprovalPolicy::default()
        };
        let one = run(
            &[comment(1, "alice", 1, "/approve")],
            &default_owners(),
            &policy,
        );
        assert_eq!(one.decision, Decision::Lgtm);

        let two = run(
            &[
                comment(1, "alice", 1, "/approve"),
                comment(2, "bob", 2, "/approve"),
            ],
            &default_owners(),
            &policy,
        );
        assert_eq!(two.decision, Decision::Approved);
    }

    #[test]
    fn test_coverage_mode_needs_every_directory() {
        let policy = ApprovalPolicy {
            number_of_approvers: 5,
            mode: ApprovalMode::Coverage,
            ..ApprovalPolicy::default()
        };
        let result = run(
            &[comment(1, "bob", 1, "/approve")],
            &default_owners(),
            &policy,
        );
        assert_eq!(result.decision, Decision::Approved);
    }

    #[test]
    fn test_zero_required_approvers_still_needs_one() {
        let policy = ApprovalPolicy {
            number_of_approvers: 0,
            mode: ApprovalMode::Count,
            ..ApprovalPolicy::default()
        };
        assert!(!approvals_satisfied(&[], &default_owners(), &policy));
    }

    #[test]
    fn test_uncovered_directories() {
        let owners = default_owners();
        assert_eq!(uncovered_directories(&[], &owners), vec!["docs", "src"]);
        assert_eq!(
            uncovered_directories(&logins(&["alice"]), &owners),
            vec!["docs"]
        );
        assert!(uncovered_directories(&logins(&["bob"]), &owners).is_empty());
    }

    #[test]
    fn test_eligible_comments_filters_stale_bot_and_chatter() {
        let bot = Login::new("approvebot");
        let comments = [
            comment(1, "carol", -10, "/lgtm"),
            comment(2, "carol", 0, "/lgtm"),
            comment(3, "approvebot", 5, "/lgtm"),
            comment(4, "dave", 6, "looks fine to me"),
            comment(5, "erin", 7, "/lbtm"),
        ];
        let eligible = eligible_comments(&comments, at(0), &bot);
        let ids: Vec<u64> = eligible.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![5], "only strictly newer, non-bot commands survive");
    }

    #[test]
    fn test_push_discards_earlier_approvals() {
        let bot = Login::new("approvebot");
        let comments = [
            comment(1, "bob", 1, "/approve"),
            comment(2, "carol", 2, "/lgtm"),
        ];
        let eligible = eligible_comments(&comments, at(10), &bot);
        let result = compute(
            &eligible,
            &Login::new(AUTHOR),
            &default_owners(),
            &ApprovalPolicy::default(),
        );
        assert_eq!(result.decision, Decision::None);
        assert_eq!(result.evidence, Evidence::default());
    }

    // =========================================================================
    // Property Tests
    // =========================================================================

    const VOTERS: [&str; 5] = ["alice", "bob", "carol", "dave", AUTHOR];
    const BODIES: [&str; 5] = ["/lgtm", "/lbtm", "/approve", "/reject", "hello"];

    fn arb_comments() -> impl Strategy<Value = Vec<Comment>> {
        prop::collection::vec((0..VOTERS.len(), 0..BODIES.len()), 0..12).prop_map(|votes| {
            votes
                .into_iter()
                .enumerate()
                .map(|(i, (voter, body))| comment(i as u64, VOTERS[voter], i as i64, BODIES[body]))
                .collect()
        })
    }

    fn arb_policy() -> impl Strategy<Value = ApprovalPolicy> {
        (
            0usize..4,
            prop_oneof![
                Just(ApprovalMode::Count),
                Just(ApprovalMode::Coverage),
                Just(ApprovalMode::CountAndCoverage)
            ],
            any::<bool>(),
        )
            .prop_map(|(number_of_approvers, mode, allow_self_approve)| ApprovalPolicy {
                number_of_approvers,
                mode,
                allow_self_approve,
                max_suggested_approvers: 3,
            })
    }

    proptest! {
        /// Property: a live reject or an uncountered disagree always wins
        #[test]
        fn reject_or_uncountered_disagree_is_request_change(
            comments in arb_comments(),
            policy in arb_policy()
        ) {
            let owners = default_owners();
            let refs: Vec<&Comment> = comments.iter().collect();
            let author = Login::new(AUTHOR);
            let tally = Tally::from_comments(&refs, &author, &owners, policy.allow_self_approve);
            let result = compute(&refs, &author, &owners, &policy);

            let must_request_change = !tally.rejected().is_empty()
                || (!tally.disagreed().is_empty() && tally.approved().is_empty());
            if must_request_change {
                prop_assert_eq!(result.decision, Decision::RequestChange);
            } else {
                prop_assert_ne!(result.decision, Decision::RequestChange);
            }
        }

        /// Property: the author never appears on the review axis, nor as an approver unless allowed
        #[test]
        fn author_excluded_from_evidence(
            comments in arb_comments(),
            policy in arb_policy()
        ) {
            let result = compute(
                &comments.iter().collect::<Vec<_>>(),
                &Login::new(AUTHOR),
                &default_owners(),
                &policy,
            );
            let author = Login::new(AUTHOR);
            prop_assert!(!result.evidence.agreed.contains(&author));
            prop_assert!(!result.evidence.disagreed.contains(&author));
            if !policy.allow_self_approve {
                prop_assert!(!result.evidence.approved.contains(&author));
            }
        }

        /// Property: at most one live vote per identity per axis
        #[test]
        fn one_live_vote_per_axis(comments in arb_comments(), policy in arb_policy()) {
            let result = compute(
                &comments.iter().collect::<Vec<_>>(),
                &Login::new(AUTHOR),
                &default_owners(),
                &policy,
            );
            let e = &result.evidence;
            for login in &e.agreed {
                prop_assert!(!e.disagreed.contains(login));
            }
            for login in &e.approved {
                prop_assert!(!e.rejected.contains(login));
            }
        }

        /// Property: the same comments always produce the same consensus
        #[test]
        fn compute_is_deterministic(comments in arb_comments(), policy in arb_policy()) {
            let refs: Vec<&Comment> = comments.iter().collect();
            let author = Login::new(AUTHOR);
            let owners = default_owners();
            prop_assert_eq!(
                compute(&refs, &author, &owners, &policy),
                compute(&refs, &author, &owners, &policy)
            );
        }
    }
}
