//! Sanity checks for loaded configuration.

use serde::{Deserialize, Serialize};

use crate::config::ClaudingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

impl Validate for ClaudingConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.agent.executable.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "agent.executable.empty",
                message: "agent executable is empty; nothing can be launched".to_string(),
            });
        }

        if self.agent.id.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "agent.id.empty",
                message: "agent id is empty; per-agent system prompts will never match"
                    .to_string(),
            });
        }

        for agent_id in self.agent_prompts.keys() {
            if agent_id.trim().is_empty() {
                issues.push(ValidationIssue {
                    level: ValidationLevel::Warning,
                    code: "agent_prompts.key.empty",
                    message: "agent_prompts has an entry with an empty agent id".to_string(),
                });
            }
        }

        if self.terminal.product_prefix.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "terminal.product_prefix.empty",
                message: "product prefix is empty; terminal names would collide across products"
                    .to_string(),
            });
        }

        if self.terminal.rows == 0 || self.terminal.cols == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "terminal.size.zero",
                message: format!(
                    "terminal size {}x{} is invalid",
                    self.terminal.cols, self.terminal.rows
                ),
            });
        }

        if self.stability.interval_ms == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "stability.interval.zero",
                message: "stability interval cannot be 0".to_string(),
            });
        }

        if self.stability.required_stable_checks == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "stability.checks.zero",
                message: "required_stable_checks must be greater than zero".to_string(),
            });
        }

        let minimum_wait = self
            .stability
            .interval_ms
            .saturating_mul(u64::from(self.stability.required_stable_checks));
        if self.stability.max_wait_ms < minimum_wait {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "stability.max_wait.low",
                message: format!(
                    "max_wait_ms {} is below interval × checks ({minimum_wait}); every wait will time out",
                    self.stability.max_wait_ms
                ),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(config: &ClaudingConfig) -> Vec<&'static str> {
        config.validate().into_iter().map(|issue| issue.code).collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(ClaudingConfig::default().validate().is_empty());
    }

    #[test]
    fn flags_empty_executable_and_prefix() {
        let mut config = ClaudingConfig::default();
        config.agent.executable = "  ".to_string();
        config.terminal.product_prefix = String::new();

        let codes = codes(&config);
        assert!(codes.contains(&"agent.executable.empty"));
        assert!(codes.contains(&"terminal.product_prefix.empty"));
    }

    #[test]
    fn flags_degenerate_stability_settings() {
        let mut config = ClaudingConfig::default();
        config.stability.interval_ms = 0;
        config.stability.required_stable_checks = 0;

        let codes = codes(&config);
        assert!(codes.contains(&"stability.interval.zero"));
        assert!(codes.contains(&"stability.checks.zero"));
    }

    #[test]
    fn warns_when_max_wait_cannot_reach_stability() {
        let mut config = ClaudingConfig::default();
        config.stability.max_wait_ms = 100;

        let issues = config.validate();
        let issue = issues
            .iter()
            .find(|issue| issue.code == "stability.max_wait.low")
            .expect("low max wait issue");
        assert_eq!(issue.level, ValidationLevel::Warning);
    }
}
