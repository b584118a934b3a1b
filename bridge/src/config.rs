use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::escalation::EscalationOptions;

pub const DEFAULT_CONFIG_PATH: &str = "bridge.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub slack: SlackConfig,
    pub jira: JiraConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub signing_secret: String,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    #[serde(default = "default_clock_skew_secs")]
    pub clock_skew_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Monitored channel name -> trigger reaction name.
    #[serde(default)]
    pub channels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub project: String,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    #[serde(default = "default_summary_template")]
    pub summary_template: String,
    /// Looked up from the authenticated user when unset.
    #[serde(default)]
    pub reporter_account_id: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_escalation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    #[serde(default = "default_notify_on_failure")]
    pub notify_on_failure: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_escalation_timeout_secs(),
            dedup_capacity: default_dedup_capacity(),
            notify_on_failure: default_notify_on_failure(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_clock_skew_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_issue_type() -> String {
    "Task".to_string()
}

fn default_summary_template() -> String {
    "Escalated from #{channel}: {first_line}".to_string()
}

fn default_escalation_timeout_secs() -> u64 {
    60
}

fn default_dedup_capacity() -> usize {
    1024
}

fn default_notify_on_failure() -> bool {
    true
}

impl BridgeConfig {
    /// Read the TOML file at `path` and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: BridgeConfig = toml::from_str(content)?;
        config.slack.channels = config
            .slack
            .channels
            .into_iter()
            .map(|(name, emoji)| {
                (
                    name.trim().trim_start_matches('#').to_string(),
                    emoji.trim().trim_matches(':').to_string(),
                )
            })
            .collect();
        Ok(config)
    }

    /// Secrets and endpoints may come from the environment (or `.env`)
    /// instead of the config file; the environment wins.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 6] = [
            ("BRIDGE_BIND_ADDRESS", &mut self.bind_address),
            ("SLACK_SIGNING_SECRET", &mut self.slack.signing_secret),
            ("SLACK_BOT_TOKEN", &mut self.slack.bot_token),
            ("JIRA_URL", &mut self.jira.base_url),
            ("JIRA_USERNAME", &mut self.jira.username),
            ("JIRA_API_TOKEN", &mut self.jira.api_token),
        ];
        for (key, field) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *field = value;
            }
        }
        if let Some(account) = lookup("JIRA_REPORTER_ACCOUNT_ID").filter(|v| !v.trim().is_empty())
        {
            self.jira.reporter_account_id = Some(account);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("slack.signing_secret", &self.slack.signing_secret),
            ("slack.bot_token", &self.slack.bot_token),
            ("jira.base_url", &self.jira.base_url),
            ("jira.username", &self.jira.username),
            ("jira.api_token", &self.jira.api_token),
            ("jira.project", &self.jira.project),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("{} must be set", name);
            }
        }

        if self.slack.channels.is_empty() {
            bail!("slack.channels must list at least one channel");
        }
        if let Some((name, _)) = self
            .slack
            .channels
            .iter()
            .find(|(name, emoji)| name.is_empty() || emoji.is_empty())
        {
            bail!("slack.channels entry '{}' needs a channel name and an emoji", name);
        }
        Ok(())
    }

    pub fn clock_skew_tolerance(&self) -> Duration {
        Duration::from_secs(self.slack.clock_skew_secs)
    }

    pub fn slack_request_timeout(&self) -> Duration {
        Duration::from_secs(self.slack.request_timeout_secs.max(1))
    }

    pub fn jira_request_timeout(&self) -> Duration {
        Duration::from_secs(self.jira.request_timeout_secs.max(1))
    }

    pub fn escalation_options(&self) -> EscalationOptions {
        EscalationOptions {
            deadline: Duration::from_secs(self.escalation.timeout_secs.max(1)),
            dedup_capacity: self.escalation.dedup_capacity,
            notify_on_failure: self.escalation.notify_on_failure,
        }
    }
}
