use serde::{Deserialize, Serialize};

/// How approvals are judged sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Enough distinct approving identities.
    Count,
    /// Every touched directory has at least one approval from one of its approvers.
    Coverage,
    /// Both of the above.
    #[default]
    CountAndCoverage,
}

/// Per-repository approval rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPolicy {
    pub number_of_approvers: usize,
    pub mode: ApprovalMode,
    pub allow_self_approve: bool,
    pub max_suggested_approvers: usize,
}

impl ApprovalPolicy {
    /// A configured value of zero still needs one approval.
    pub fn required_approvers(&self) -> usize {
        self.number_of_approvers.max(1)
    }
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            number_of_approvers: 1,
            mode: ApprovalMode::default(),
            allow_self_approve: false,
            max_suggested_approvers: 3,
        }
    }
}
