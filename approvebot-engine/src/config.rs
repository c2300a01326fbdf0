//! Review-trigger configuration.
//!
//! Loaded from a JSON file. Each [`RepoConfig`] applies to the repositories
//! it names, either a whole organisation (`"org"`) or a single repository
//! (`"org/repo"`); a repository entry wins over an organisation entry.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use approvebot_core::{ApprovalMode, ApprovalPolicy, Login};

use crate::error::TriggerError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "APPROVEBOT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Identity the bot comments as.
    pub bot_name: String,
    /// Where the full list of commands is documented.
    #[serde(default)]
    pub commands_link: String,
    #[serde(default)]
    pub repos: Vec<RepoConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub repos: Vec<String>,

    #[serde(default = "default_number_of_approvers")]
    pub number_of_approvers: usize,

    #[serde(default)]
    pub approval_policy: ApprovalMode,

    #[serde(default)]
    pub allow_self_approve: bool,

    /// Remove CI labels on push and use the passed label to gate suggestions.
    #[serde(default)]
    pub enable_label_for_ci: bool,

    #[serde(default = "default_label_for_ci_passed")]
    pub label_for_ci_passed: String,

    #[serde(default = "default_label_for_ci_failed")]
    pub label_for_ci_failed: String,

    #[serde(default = "default_max_suggested_approvers")]
    pub max_suggested_approvers: usize,

    #[serde(default)]
    pub reviewers: ReviewersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewersConfig {
    /// How many reviewers to suggest when a request is opened or pushed.
    #[serde(default = "default_reviewers_total")]
    pub total_number: usize,
}

impl Default for ReviewersConfig {
    fn default() -> Self {
        Self {
            total_number: default_reviewers_total(),
        }
    }
}

fn default_number_of_approvers() -> usize {
    1
}

fn default_label_for_ci_passed() -> String {
    "ci-passed".to_string()
}

fn default_label_for_ci_failed() -> String {
    "ci-failed".to_string()
}

fn default_max_suggested_approvers() -> usize {
    3
}

fn default_reviewers_total() -> usize {
    2
}

impl RepoConfig {
    pub fn policy(&self) -> ApprovalPolicy {
        ApprovalPolicy {
            number_of_approvers: self.number_of_approvers,
            mode: self.approval_policy,
            allow_self_approve: self.allow_self_approve,
            max_suggested_approvers: self.max_suggested_approvers,
        }
    }

    /// The CI-passed label, when CI labels are enabled.
    pub fn ci_passed_label(&self) -> Option<&str> {
        self.enable_label_for_ci
            .then_some(self.label_for_ci_passed.as_str())
    }

    /// CI labels a code push removes.
    pub fn ci_labels(&self) -> Vec<&str> {
        if self.enable_label_for_ci {
            vec![
                self.label_for_ci_passed.as_str(),
                self.label_for_ci_failed.as_str(),
            ]
        } else {
            Vec::new()
        }
    }
}

impl TriggerConfig {
    pub fn bot(&self) -> Login {
        Login::new(&self.bot_name)
    }

    /// Configuration for a repository, preferring an exact `org/repo` entry.
    pub fn config_for(&self, org: &str, repo: &str) -> Result<&RepoConfig, TriggerError> {
        let full = format!("{}/{}", org, repo);
        let names = |c: &&RepoConfig, wanted: &str| c.repos.iter().any(|r| r == wanted);

        self.repos
            .iter()
            .find(|c| names(c, &full))
            .or_else(|| self.repos.iter().find(|c| names(c, org)))
            .ok_or_else(|| TriggerError::ConfigNotFound {
                org: org.to_string(),
                repo: repo.to_string(),
            })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "bot_name": "ApproveBot",
        "commands_link": "https://example.com/commands",
        "repos": [
            { "repos": ["acme"] },
            {
                "repos": ["acme/engine", "other/tool"],
                "number_of_approvers": 2,
                "approval_policy": "coverage",
                "allow_self_approve": true,
                "enable_label_for_ci": true,
                "label_for_ci_passed": "ci/passed",
                "reviewers": { "total_number": 4 }
            }
        ]
    }"#;

    fn sample() -> TriggerConfig {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = sample();
        let repo = config.config_for("acme", "website").unwrap();
        assert_eq!(repo.policy(), ApprovalPolicy::default());
        assert_eq!(repo.reviewers.total_number, 2);
        assert_eq!(repo.ci_passed_label(), None);
        assert!(repo.ci_labels().is_empty());
        assert_eq!(config.bot(), Login::new("approvebot"));
    }

    #[test]
    fn test_exact_repo_entry_preferred() {
        let config = sample();
        let repo = config.config_for("acme", "engine").unwrap();
        assert_eq!(repo.number_of_approvers, 2);
        assert_eq!(repo.approval_policy, ApprovalMode::Coverage);
        assert!(repo.allow_self_approve);
        assert_eq!(repo.ci_passed_label(), Some("ci/passed"));
        assert_eq!(repo.ci_labels(), vec!["ci/passed", "ci-failed"]);
        assert_eq!(repo.reviewers.total_number, 4);
    }

    #[test]
    fn test_missing_config() {
        let config = sample();
        let err = config.config_for("nobody", "repo").unwrap_err();
        assert!(matches!(
            err,
            TriggerError::ConfigNotFound { ref org, ref repo } if org == "nobody" && repo == "repo"
        ));
        // "other" only has a repository entry, not an organisation one.
        assert!(config.config_for("other", "website").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = TriggerConfig::load(file.path()).unwrap();
        assert_eq!(config.repos.len(), 2);
        assert_eq!(config.commands_link, "https://example.com/commands");
    }

    #[test]
    fn test_load_reports_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = TriggerConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse config file"));
    }
}
