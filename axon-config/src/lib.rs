//! # Axon Configuration System
//!
//! Layered configuration for the axon runtime and its bundled simulator.
//!
//! ## Features
//! - **Unified Configuration**: one worker count shared by the scheduler and every pathway
//! - **Validation**: range and cross-field checks before any run starts
//! - **Environment Awareness**: per-environment YAML overrides and `AXON_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod runtime;
mod scenario;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use runtime::RuntimeConfig;
pub use scenario::{PhaseConfig, ScenarioConfig};
pub use telemetry::TelemetryConfig;

/// Top‑level configuration container for all axon components.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct AxonConfig {
    /// Worker pool and pathway partitioning.
    #[validate(nested)]
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Simulator scenario.
    #[validate(nested)]
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

impl AxonConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/axon.yaml` - base settings, skipped if missing.
    /// 3. `config/<AXON_ENV>.yaml` - environment‑specific overrides (default `development`).
    /// 4. `AXON_*` environment variables, `__` separating nested keys.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AxonConfig::default()));

        if Path::new("config/axon.yaml").exists() {
            figment = figment.merge(Yaml::file("config/axon.yaml"));
        }

        let env = std::env::var("AXON_ENV").unwrap_or_else(|_| "development".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific file, on top of defaults and
    /// below `AXON_*` environment variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::finish(
            Figment::from(Serialized::defaults(AxonConfig::default())).merge(Yaml::file(path)),
        )
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed("AXON_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::pathway::RemainderPolicy;
    use figment::Jail;

    #[test]
    fn full_config_validation() {
        let config = AxonConfig::default();
        config.validate().expect("Default config should validate");
        assert!(config.runtime.workers >= 1);
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("AXON_RUNTIME__WORKERS", "3");
            jail.set_env("AXON_SCENARIO__SEED", "7");
            let config = AxonConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.runtime.workers, 3);
            assert_eq!(config.scenario.seed, 7);
            Ok(())
        });
    }

    #[test]
    fn yaml_layers_merge_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/axon.yaml",
                r#"
runtime:
  workers: 2
  remainder_policy: drop
scenario:
  sources: 10
"#,
            )?;
            jail.create_file(
                "config/staging.yaml",
                r#"
telemetry:
  log_level: debug
"#,
            )?;
            jail.set_env("AXON_ENV", "staging");

            let config = AxonConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.runtime.workers, 2);
            assert_eq!(config.runtime.remainder_policy, RemainderPolicy::Drop);
            assert_eq!(config.scenario.sources, 10);
            assert_eq!(config.scenario.targets, ScenarioConfig::default().targets);
            assert_eq!(config.telemetry.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn load_from_path_reports_nested_errors() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bad.yaml",
                r#"
runtime:
  workers: 0
scenario:
  phases:
    - duration: 1.0
      dt: -0.1
"#,
            )?;
            let err = AxonConfig::load_from_path("bad.yaml").unwrap_err();
            let message = err.to_string();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(message.contains("runtime.workers"), "{message}");
            assert!(message.contains("scenario.phases[0].dt"), "{message}");
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            AxonConfig::load_from_path("definitely/not/here.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = AxonConfig::default();
        config.telemetry.log_level = "verbose".into();
        assert!(config.validate().is_err());
    }
}
