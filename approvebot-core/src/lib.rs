pub mod command;
pub mod consensus;
pub mod effect;
pub mod labels;
pub mod model;
pub mod ownership;
pub mod plan;
pub mod policy;
pub mod suggest;
pub mod tips;

pub use command::{parse_commands, parse_comment, Axis, Command};
pub use consensus::{Consensus, Decision, Evidence};
pub use effect::Effect;
pub use model::{ChangeRequest, Comment, CommentId, LabelSet, Login, PrRef, PrState};
pub use ownership::OwnershipMap;
pub use plan::{plan_review, ReviewContext, ReviewPlan};
pub use policy::{ApprovalMode, ApprovalPolicy};
pub use suggest::{suggest_approvers, suggest_reviewers, SuggestInput};
pub use tips::ApproveTips;
