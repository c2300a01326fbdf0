//! Lifecycle label transitions.
//!
//! Labels are independent presences on the hosting service, but only
//! decision-consistent combinations are ever written. Every function here
//! diffs the desired labels against one snapshot and emits only the delta.

use crate::consensus::Decision;
use crate::effect::Effect;
use crate::model::LabelSet;

pub const CAN_REVIEW: &str = "can-review";
pub const LGTM: &str = "lgtm";
pub const APPROVED: &str = "approved";
pub const REQUEST_CHANGE: &str = "request-change";

/// Labels a code push always invalidates.
pub const INVALIDATED_BY_PUSH: [&str; 3] = [APPROVED, REQUEST_CHANGE, LGTM];

struct Transition {
    add: &'static [&'static str],
    remove: &'static [&'static str],
    announce: bool,
}

fn transition_for(decision: Decision) -> Option<Transition> {
    match decision {
        Decision::Lgtm => Some(Transition {
            add: &[LGTM],
            remove: &[APPROVED, REQUEST_CHANGE, CAN_REVIEW],
            announce: true,
        }),
        Decision::RequestChange => Some(Transition {
            add: &[REQUEST_CHANGE],
            remove: &[APPROVED, LGTM, CAN_REVIEW],
            announce: true,
        }),
        Decision::Approved => Some(Transition {
            add: &[APPROVED, LGTM],
            remove: &[REQUEST_CHANGE, CAN_REVIEW],
            announce: false,
        }),
        Decision::None => None,
    }
}

/// Label effects that bring `labels` in line with `decision`.
pub fn label_effects(decision: Decision, labels: &LabelSet) -> Vec<Effect> {
    let Some(transition) = transition_for(decision) else {
        return Vec::new();
    };

    let mut effects = Vec::new();

    let to_add: Vec<String> = transition
        .add
        .iter()
        .filter(|l| !labels.has(l))
        .map(|l| l.to_string())
        .collect();
    if !to_add.is_empty() {
        let announcement = if transition.announce {
            Some(format!("{} label has been added.", to_add.join(", ")))
        } else {
            None
        };
        effects.push(Effect::AddLabels {
            labels: to_add,
            announcement,
        });
    }

    effects.extend(
        transition
            .remove
            .iter()
            .filter(|l| labels.has(l))
            .map(|l| Effect::RemoveLabel {
                label: l.to_string(),
            }),
    );

    effects
}

/// Label effects for a code push to an open request.
///
/// Removes the review outcome labels (and CI labels, when given) that are
/// present, posts a notice naming what was removed, and restores `can-review`.
pub fn push_effects(labels: &LabelSet, ci_labels: &[&str]) -> Vec<Effect> {
    let mut stale: Vec<&str> = INVALIDATED_BY_PUSH.to_vec();
    stale.extend_from_slice(ci_labels);

    let removed: Vec<&str> = stale.into_iter().filter(|l| labels.has(l)).collect();

    let mut effects: Vec<Effect> = removed
        .iter()
        .map(|l| Effect::RemoveLabel {
            label: l.to_string(),
        })
        .collect();

    if !removed.is_empty() {
        effects.push(Effect::CreateComment {
            body: format!(
                "New changes are detected. Remove the following labels: {}.",
                removed.join(", ")
            ),
        });
    }

    if !labels.has(CAN_REVIEW) {
        effects.push(Effect::AddLabels {
            labels: vec![CAN_REVIEW.to_string()],
            announcement: None,
        });
    }

    effects
}

/// Apply effects to a label snapshot, as the hosting service would.
#[cfg(test)]
pub(crate) fn apply_to(labels: &LabelSet, effects: &[Effect]) -> LabelSet {
    let mut next = labels.clone();
    for effect in effects {
        match effect {
            Effect::AddLabels { labels, .. } => {
                for label in labels {
                    next.insert(label.clone());
                }
            }
            Effect::RemoveLabel { label } => {
                next.remove(label);
            }
            _ => {}
        }
    }
    next
}
