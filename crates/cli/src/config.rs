//! Harness configuration (`eventseq.toml`) and the JSON run payload.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eventseq_engine::{RunOptions, WaitPolicy, RESET_POLICY};
use eventseq_provider::StripeConfig;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "EVENTSEQ_CONFIG";
pub const EXPORTER_BIN_ENV: &str = "EVENTSEQ_EXPORTER_BIN";
pub const EXPORTER_BUILD_ENV: &str = "EVENTSEQ_EXPORTER_BUILD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{}': {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid --data payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Everything about a run that is not in the `--data` payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub exporter: ExporterConfig,
    pub reset: ResetConfig,
    pub timing: TimingConfig,
    pub diff: DiffConfig,
    pub stripe: StripeConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Download binary invoked as `<binary> --json '<payload>'`.
    pub binary: Option<PathBuf>,
    /// Shell command run before every export.
    pub build_command: Option<String>,
    pub snapshot_extension: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            binary: None,
            build_command: None,
            snapshot_extension: "snapshot".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// Shell command that deletes all test data in the account.
    pub command: Option<String>,
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        ResetConfig {
            command: None,
            poll_interval_ms: RESET_POLICY.interval.as_millis() as u64,
            timeout_ms: RESET_POLICY.timeout.as_millis() as u64,
        }
    }
}

impl ResetConfig {
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub min_spacing_ms: u64,
    pub settle_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub convergence_timeout_ms: u64,
    pub discovery_window_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let defaults = RunOptions::default();
        TimingConfig {
            min_spacing_ms: defaults.min_spacing.as_millis() as u64,
            settle_delay_ms: defaults.settle_delay.as_millis() as u64,
            poll_interval_ms: defaults.convergence.interval.as_millis() as u64,
            convergence_timeout_ms: defaults.convergence.timeout.as_millis() as u64,
            discovery_window_ms: defaults.discovery_window.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Keep expected/observed type lists in temp files on a convergence timeout.
    pub write_files: bool,
    /// Opens those files, e.g. `code --diff`.
    pub command: Option<String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        DiffConfig {
            write_files: true,
            command: None,
        }
    }
}

impl HarnessConfig {
    /// Load from `path`, else `$EVENTSEQ_CONFIG`, else defaults; then apply
    /// the exporter environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_file(&p)?,
            None => HarnessConfig::default(),
        };

        if let Some(bin) = std::env::var_os(EXPORTER_BIN_ENV) {
            config.exporter.binary = Some(PathBuf::from(bin));
        }
        if let Ok(build) = std::env::var(EXPORTER_BUILD_ENV) {
            config.exporter.build_command = Some(build);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn run_options(&self, scratch_dir: &Path) -> RunOptions {
        let t = &self.timing;
        RunOptions {
            min_spacing: Duration::from_millis(t.min_spacing_ms),
            settle_delay: Duration::from_millis(t.settle_delay_ms),
            convergence: WaitPolicy::new(
                Duration::from_millis(t.poll_interval_ms),
                Duration::from_millis(t.convergence_timeout_ms),
            ),
            discovery_window: Duration::from_millis(t.discovery_window_ms),
            scratch_dir: scratch_dir.to_path_buf(),
            write_diff_files: self.diff.write_files,
            diff_command: self.diff.command.clone(),
        }
    }
}

/// The `--data` JSON.
#[derive(Clone, Deserialize)]
pub struct RunPayload {
    pub data_dir: PathBuf,
    pub stripe_sec_key: String,
    /// A registered timeline key, or `*` for every timeline not yet written.
    pub event_seq_key: String,
    /// Skip reset, snapshots and convergence; print what each write produced.
    #[serde(default)]
    pub fast_mode: bool,
}

impl RunPayload {
    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }
}

impl fmt::Debug for RunPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunPayload")
            .field("data_dir", &self.data_dir)
            .field("stripe_sec_key", &"<redacted>")
            .field("event_seq_key", &self.event_seq_key)
            .field("fast_mode", &self.fast_mode)
            .finish()
    }
}

/// Resolve the payload key against the registry.
///
/// `*` selects every registered key without a directory in `data_dir`.
pub fn select_keys<'k>(
    key: &str,
    registered: &[&'k str],
    data_dir: &Path,
) -> Result<Vec<&'k str>, String> {
    if key != "*" {
        return registered
            .iter()
            .find(|k| **k == key)
            .map(|k| vec![*k])
            .ok_or_else(|| format!("No event seq with key \"{}\".", key));
    }

    let existing: Vec<String> = match std::fs::read_dir(data_dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    let missing: Vec<&'k str> = registered
        .iter()
        .copied()
        .filter(|k| !existing.iter().any(|e| e == k))
        .collect();

    if missing.is_empty() {
        return Err(format!(
            "All timelines already exist in {}. Delete the directory to re-create them.",
            data_dir.display()
        ));
    }
    if !existing.is_empty() {
        tracing::info!(skipped = ?existing, "timelines already written");
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[&str] = &["charge_refund_1", "customer_1"];

    #[test]
    fn empty_toml_is_all_defaults() {
        let config: HarnessConfig = toml::from_str("").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.timing.min_spacing_ms, 1100);
        assert_eq!(config.timing.settle_delay_ms, 3000);
        assert_eq!(config.stripe.api_version, "2020-08-27");
        assert!(config.diff.write_files);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [exporter]
            binary = "/opt/stripe-dl/cli"
            snapshot_extension = "sqlite"

            [timing]
            min_spacing_ms = 1500

            [reset]
            command = "./delete-test-data.sh"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.exporter.binary.as_deref(),
            Some(Path::new("/opt/stripe-dl/cli"))
        );
        assert_eq!(config.exporter.snapshot_extension, "sqlite");
        assert_eq!(config.timing.min_spacing_ms, 1500);
        assert_eq!(config.timing.poll_interval_ms, 500);
        assert_eq!(config.reset.command.as_deref(), Some("./delete-test-data.sh"));
        assert_eq!(config.reset.timeout_ms, 60_000);

        let options = config.run_options(Path::new("/tmp"));
        assert_eq!(options.min_spacing, Duration::from_millis(1500));
        assert_eq!(options.convergence.timeout, Duration::from_secs(10));
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let err = HarnessConfig::from_file(Path::new("/nonexistent/eventseq.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/eventseq.toml"));
    }

    #[test]
    fn payload_defaults_fast_mode_off() {
        let payload = RunPayload::parse(
            r#"{"data_dir": "/tmp/x", "stripe_sec_key": "sk_test_1", "event_seq_key": "customer_1"}"#,
        )
        .unwrap();
        assert!(!payload.fast_mode);
        assert!(!format!("{:?}", payload).contains("sk_test_1"));
    }

    #[test]
    fn payload_requires_key() {
        let err = RunPayload::parse(r#"{"data_dir": "/tmp/x", "stripe_sec_key": "k"}"#).unwrap_err();
        assert!(err.to_string().contains("event_seq_key"));
    }

    #[test]
    fn select_single_key() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            select_keys("customer_1", KEYS, dir.path()).unwrap(),
            ["customer_1"]
        );
        let err = select_keys("invoice_9", KEYS, dir.path()).unwrap_err();
        assert_eq!(err, "No event seq with key \"invoice_9\".");
    }

    #[test]
    fn star_skips_existing_bundles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("customer_1")).unwrap();
        assert_eq!(
            select_keys("*", KEYS, dir.path()).unwrap(),
            ["charge_refund_1"]
        );

        std::fs::create_dir(dir.path().join("charge_refund_1")).unwrap();
        let err = select_keys("*", KEYS, dir.path()).unwrap_err();
        assert!(err.starts_with("All timelines already exist"));
    }

    #[test]
    fn star_with_missing_data_dir_selects_all() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-yet");
        assert_eq!(select_keys("*", KEYS, &missing).unwrap(), KEYS);
    }
}
