use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::arch::conv::BankLayout;

const DEFAULT_CONFIG: &str = include_str!("default.toml");

#[derive(Debug, Error)]
pub enum AppConfigError {
  #[error("failed to load configuration: {0}")]
  Load(#[from] ::config::ConfigError),
  #[error("invalid configuration: {0}")]
  Invalid(String),
}

/// Simulation section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  /// JSON-lines message trace; empty disables tracing.
  #[serde(default)]
  pub trace_file: String,
  #[serde(default = "default_max_cycles")]
  pub max_cycles: u64,
}

fn default_max_cycles() -> u64 {
  10_000_000
}

impl Default for SimulationSection {
  fn default() -> Self {
    Self {
      quiet: false,
      step_mode: false,
      trace_file: String::new(),
      max_cycles: default_max_cycles(),
    }
  }
}

/// Engine section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSection {
  #[serde(default)]
  pub layout: BankLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub simulation: SimulationSection,
  #[serde(default)]
  pub engine: EngineSection,
}

/// Command-line values that take precedence over every config layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides<'a> {
  pub quiet: bool,
  pub step: bool,
  pub trace_file: Option<&'a str>,
  pub layout: Option<BankLayout>,
  pub max_cycles: Option<u64>,
}

/// Loads the layered configuration:
/// 1. the built-in defaults
/// 2. `user_file`, if given (must exist)
/// 3. `CONVCORE_<SECTION>__<KEY>` environment variables
pub fn load_config(user_file: Option<&Path>) -> Result<AppConfig, AppConfigError> {
  build(user_file, true)
}

fn build(user_file: Option<&Path>, with_env: bool) -> Result<AppConfig, AppConfigError> {
  let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
  if let Some(path) = user_file {
    builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
  }
  if with_env {
    builder = builder.add_source(
      Environment::with_prefix("CONVCORE")
        .prefix_separator("_")
        .separator("__"),
    );
  }

  let config = builder.build()?.try_deserialize::<AppConfig>()?;
  log::debug!("configuration loaded: {:?}", config);
  Ok(config)
}

pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides<'_>) {
  if cli.quiet {
    config.simulation.quiet = true;
  }
  if cli.step {
    config.simulation.step_mode = true;
  }
  if let Some(file) = cli.trace_file {
    config.simulation.trace_file = file.to_string();
  }
  if let Some(layout) = cli.layout {
    config.engine.layout = layout;
  }
  if let Some(max_cycles) = cli.max_cycles {
    config.simulation.max_cycles = max_cycles;
  }
}

pub fn validate_config(config: &AppConfig) -> Result<(), AppConfigError> {
  if config.simulation.max_cycles == 0 {
    return Err(AppConfigError::Invalid(String::from("max_cycles must be greater than 0")));
  }

  let trace = config.simulation.trace_file.trim();
  if !trace.is_empty() && Path::new(trace).is_dir() {
    return Err(AppConfigError::Invalid(format!("trace_file '{}' is a directory", trace)));
  }

  if config.simulation.quiet && config.simulation.step_mode {
    log::warn!("quiet step mode: model status is only printed on 's'");
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn defaults_match_the_embedded_file() {
    let config = build(None, false).unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.engine.layout, BankLayout::ColumnPair);
  }

  #[test]
  fn user_file_overrides_only_what_it_sets() {
    let path = std::env::temp_dir().join(format!("convcore-config-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[engine]\nlayout = \"row_interleaved\"\n\n[simulation]\nmax_cycles = 42").unwrap();
    drop(file);

    let config = build(Some(&path), false).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.engine.layout, BankLayout::RowInterleaved);
    assert_eq!(config.simulation.max_cycles, 42);
    assert!(!config.simulation.quiet);
    assert!(config.simulation.trace_file.is_empty());
  }

  #[test]
  fn missing_user_file_is_an_error() {
    let path = Path::new("/nonexistent/convcore.toml");
    assert!(matches!(build(Some(path), false), Err(AppConfigError::Load(_))));
  }

  #[test]
  fn cli_wins_over_file_values() {
    let mut config = AppConfig::default();
    apply_cli_overrides(
      &mut config,
      &CliOverrides {
        quiet: true,
        trace_file: Some("trace.jsonl"),
        layout: Some(BankLayout::RowInterleaved),
        max_cycles: Some(7),
        ..Default::default()
      },
    );
    assert!(config.simulation.quiet);
    assert!(!config.simulation.step_mode);
    assert_eq!(config.simulation.trace_file, "trace.jsonl");
    assert_eq!(config.engine.layout, BankLayout::RowInterleaved);
    assert_eq!(config.simulation.max_cycles, 7);
  }

  #[test]
  fn validation_rejects_zero_budget_and_directory_trace() {
    let mut config = AppConfig::default();
    config.simulation.max_cycles = 0;
    assert!(validate_config(&config).is_err());

    let mut config = AppConfig::default();
    config.simulation.trace_file = std::env::temp_dir().to_string_lossy().to_string();
    assert!(validate_config(&config).is_err());

    assert!(validate_config(&AppConfig::default()).is_ok());
  }
}
