use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::model::impact::Severity;

/// Name of the per-workspace directory holding the store, locks and config.
pub const WORKSPACE_DIR: &str = ".ratify";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub impact: ImpactPolicy,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl ProjectConfig {
    /// Reject policies that would break the scoring guarantees.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        self.impact.validate()?;
        self.advisor.validate()
    }
}

/// Conflict severity thresholds and risk weights.
///
/// Overage percentages up to `low_max_pct` are low, up to `medium_max_pct`
/// medium, up to `high_max_pct` high, and anything above is critical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactPolicy {
    #[serde(default = "default_low_max_pct")]
    pub low_max_pct: f64,
    #[serde(default = "default_medium_max_pct")]
    pub medium_max_pct: f64,
    #[serde(default = "default_high_max_pct")]
    pub high_max_pct: f64,
    #[serde(default = "default_overlap_severity")]
    pub overlap_severity: Severity,
    #[serde(default)]
    pub weights: RiskWeights,
}

impl Default for ImpactPolicy {
    fn default() -> Self {
        Self {
            low_max_pct: default_low_max_pct(),
            medium_max_pct: default_medium_max_pct(),
            high_max_pct: default_high_max_pct(),
            overlap_severity: default_overlap_severity(),
            weights: RiskWeights::default(),
        }
    }
}

impl ImpactPolicy {
    /// Map a percentage above capacity onto the severity scale.
    #[must_use]
    pub fn severity_for_overage(&self, overage_pct: f64) -> Severity {
        if overage_pct <= self.low_max_pct {
            Severity::Low
        } else if overage_pct <= self.medium_max_pct {
            Severity::Medium
        } else if overage_pct <= self.high_max_pct {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    fn validate(&self) -> Result<()> {
        let thresholds = [self.low_max_pct, self.medium_max_pct, self.high_max_pct];
        if thresholds.iter().any(|t| !t.is_finite() || *t < 0.0) {
            bail!("impact thresholds must be finite and non-negative");
        }
        if !(self.low_max_pct <= self.medium_max_pct && self.medium_max_pct <= self.high_max_pct) {
            bail!("impact thresholds must satisfy low_max_pct <= medium_max_pct <= high_max_pct");
        }
        self.weights.validate()
    }
}

/// Points each input contributes to the 0-100 risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    #[serde(default = "default_low_weight")]
    pub low_conflict: f64,
    #[serde(default = "default_medium_weight")]
    pub medium_conflict: f64,
    #[serde(default = "default_high_weight")]
    pub high_conflict: f64,
    #[serde(default = "default_critical_weight")]
    pub critical_conflict: f64,
    #[serde(default = "default_delay_weight")]
    pub delayed_deadline: f64,
    #[serde(default = "default_net_hours_weight")]
    pub net_hours: f64,
    #[serde(default = "default_net_hours_cap")]
    pub net_hours_cap: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            low_conflict: default_low_weight(),
            medium_conflict: default_medium_weight(),
            high_conflict: default_high_weight(),
            critical_conflict: default_critical_weight(),
            delayed_deadline: default_delay_weight(),
            net_hours: default_net_hours_weight(),
            net_hours_cap: default_net_hours_cap(),
        }
    }
}

impl RiskWeights {
    #[must_use]
    pub const fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low_conflict,
            Severity::Medium => self.medium_conflict,
            Severity::High => self.high_conflict,
            Severity::Critical => self.critical_conflict,
        }
    }

    fn validate(&self) -> Result<()> {
        let all = [
            self.low_conflict,
            self.medium_conflict,
            self.high_conflict,
            self.critical_conflict,
            self.delayed_deadline,
            self.net_hours,
            self.net_hours_cap,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            bail!("risk weights must be finite and non-negative");
        }
        // Ordered weights keep the score monotonic in conflict severity.
        if !(self.low_conflict <= self.medium_conflict
            && self.medium_conflict <= self.high_conflict
            && self.high_conflict <= self.critical_conflict)
        {
            bail!("conflict weights must satisfy low <= medium <= high <= critical");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_task_hours")]
    pub task_benchmark_hours: f64,
    #[serde(default = "default_milestone_hours")]
    pub milestone_benchmark_hours: f64,
    #[serde(default = "default_other_hours")]
    pub other_benchmark_hours: f64,
    #[serde(default = "default_max_comparables")]
    pub max_comparables: usize,
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            task_benchmark_hours: default_task_hours(),
            milestone_benchmark_hours: default_milestone_hours(),
            other_benchmark_hours: default_other_hours(),
            max_comparables: default_max_comparables(),
            provider_timeout_ms: default_provider_timeout_ms(),
        }
    }
}

impl AdvisorConfig {
    fn validate(&self) -> Result<()> {
        let hours = [
            self.task_benchmark_hours,
            self.milestone_benchmark_hours,
            self.other_benchmark_hours,
        ];
        if hours.iter().any(|h| !h.is_finite() || *h <= 0.0) {
            bail!("benchmark hours must be positive");
        }
        if self.max_comparables == 0 {
            bail!("max_comparables must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Only mark a proposal applied once every approved item applied.
    #[serde(default)]
    pub require_all_items: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// HTTP endpoint of the content extraction service, if any.
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.ratify/config.toml` under `project_root`, falling back to defaults
/// when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read, fails to parse, or holds an
/// invalid policy.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(WORKSPACE_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(config)
}

/// Load `~/.config/ratify/config.toml` when present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("ratify/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project and user config and settle the output mode.
///
/// # Errors
///
/// Returns an error if either config file is unreadable or invalid.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_low_max_pct() -> f64 {
    10.0
}

const fn default_medium_max_pct() -> f64 {
    25.0
}

const fn default_high_max_pct() -> f64 {
    50.0
}

const fn default_overlap_severity() -> Severity {
    Severity::Medium
}

const fn default_low_weight() -> f64 {
    2.0
}

const fn default_medium_weight() -> f64 {
    5.0
}

const fn default_high_weight() -> f64 {
    10.0
}

const fn default_critical_weight() -> f64 {
    20.0
}

const fn default_delay_weight() -> f64 {
    8.0
}

const fn default_net_hours_weight() -> f64 {
    0.5
}

const fn default_net_hours_cap() -> f64 {
    30.0
}

const fn default_task_hours() -> f64 {
    8.0
}

const fn default_milestone_hours() -> f64 {
    40.0
}

const fn default_other_hours() -> f64 {
    2.0
}

const fn default_max_comparables() -> usize {
    5
}

const fn default_provider_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(root: &Path, content: &str) {
        let dir = root.join(WORKSPACE_DIR);
        std::fs::create_dir_all(&dir).expect("create workspace dir");
        std::fs::write(dir.join("config.toml"), content).expect("write config");
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg, ProjectConfig::default());
        assert!((cfg.impact.medium_max_pct - 25.0).abs() < f64::EPSILON);
        assert_eq!(cfg.impact.overlap_severity, Severity::Medium);
        assert_eq!(cfg.advisor.max_comparables, 5);
        assert!(!cfg.merge.require_all_items);
        assert!(cfg.provider.endpoint.is_none());
    }

    #[test]
    fn partial_config_keeps_remaining_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        write_config(
            root.path(),
            r#"
[impact]
high_max_pct = 75.0

[impact.weights]
critical_conflict = 40.0

[merge]
require_all_items = true

[provider]
endpoint = "http://127.0.0.1:9000/extract"
"#,
        );

        let cfg = load_project_config(root.path()).expect("load");
        assert!((cfg.impact.high_max_pct - 75.0).abs() < f64::EPSILON);
        assert!((cfg.impact.low_max_pct - 10.0).abs() < f64::EPSILON);
        assert!((cfg.impact.weights.critical_conflict - 40.0).abs() < f64::EPSILON);
        assert!((cfg.impact.weights.high_conflict - 10.0).abs() < f64::EPSILON);
        assert!(cfg.merge.require_all_items);
        assert_eq!(
            cfg.provider.endpoint.as_deref(),
            Some("http://127.0.0.1:9000/extract")
        );
    }

    #[test]
    fn unordered_weights_are_rejected() {
        let root = tempfile::tempdir().expect("temp dir");
        write_config(
            root.path(),
            "[impact.weights]\nhigh_conflict = 50.0\ncritical_conflict = 10.0\n",
        );
        let err = load_project_config(root.path()).expect_err("must reject");
        assert!(format!("{err:#}").contains("low <= medium <= high <= critical"));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let root = tempfile::tempdir().expect("temp dir");
        write_config(root.path(), "[impact\nlow_max_pct = ");
        let err = load_project_config(root.path()).expect_err("must fail");
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn severity_thresholds_are_inclusive() {
        let policy = ImpactPolicy::default();
        assert_eq!(policy.severity_for_overage(0.5), Severity::Low);
        assert_eq!(policy.severity_for_overage(10.0), Severity::Low);
        assert_eq!(policy.severity_for_overage(25.0), Severity::Medium);
        assert_eq!(policy.severity_for_overage(50.0), Severity::High);
        assert_eq!(policy.severity_for_overage(50.1), Severity::Critical);
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty".to_string()), Some("text".to_string()));
        assert_eq!(output, "json");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        let pretty = resolve_output(false, Some("table".to_string()), Some("human".to_string()));
        assert_eq!(pretty, "pretty");

        let text = resolve_output(false, Some("human".to_string()), Some("table".to_string()));
        assert_eq!(text, "text");
    }
}
