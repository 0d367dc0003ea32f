//! Settings read from `config.json` inside the application directory. Every field is optional,
//! a missing file means defaults.

use std::{collections::BTreeMap, io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::usage::{
    names::{KnownNames, LabelPolicy, NameResolver, PolicyPreset},
    refresh::{RefreshOptions, DEFAULT_TOP},
};

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_OWN_PACKAGE: &str = "com.example.timewell";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    Strict,
    Loose,
}

impl From<PresetName> for PolicyPreset {
    fn from(value: PresetName) -> Self {
        match value {
            PresetName::Strict => PolicyPreset::Strict,
            PresetName::Loose => PolicyPreset::Loose,
        }
    }
}

/// Either a named preset or explicit thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelPolicyConfig {
    Preset(PresetName),
    Custom {
        min_length: usize,
        #[serde(default)]
        rejected_labels: Vec<String>,
    },
}

impl Default for LabelPolicyConfig {
    fn default() -> Self {
        Self::Preset(PresetName::Strict)
    }
}

impl From<LabelPolicyConfig> for LabelPolicy {
    fn from(value: LabelPolicyConfig) -> Self {
        match value {
            LabelPolicyConfig::Preset(preset) => PolicyPreset::from(preset).into(),
            LabelPolicyConfig::Custom {
                min_length,
                rejected_labels,
            } => LabelPolicy {
                min_length,
                rejected_labels,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub label_policy: LabelPolicyConfig,
    /// Merged over the built in brand names.
    pub known_names: BTreeMap<String, String>,
    pub top: usize,
    pub include_system_apps: bool,
    /// Package whose usage access is checked on the device.
    pub own_package: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            label_policy: LabelPolicyConfig::default(),
            known_names: BTreeMap::new(),
            top: DEFAULT_TOP,
            include_system_apps: false,
            own_package: DEFAULT_OWN_PACKAGE.into(),
        }
    }
}

impl AppConfig {
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config {path:?}")),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {path:?}, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read config {path:?}")),
        }
    }

    pub fn name_resolver(&self) -> NameResolver {
        NameResolver::new(
            KnownNames::default().with_entries(self.known_names.clone()),
            self.label_policy.clone().into(),
        )
    }

    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            top: self.top,
            include_system_apps: self.include_system_apps,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::usage::names::LabelPolicy;

    use super::{AppConfig, LabelPolicyConfig, PresetName, CONFIG_FILE};

    #[test]
    fn missing_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load(dir.path())?;
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.refresh_options().top, 10);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "label_policy": "loose", "known_names": { "org.telegram.messenger": "Telegram" } }"#,
        )?;

        let config = AppConfig::load(dir.path())?;

        assert_eq!(config.label_policy, LabelPolicyConfig::Preset(PresetName::Loose));
        assert_eq!(config.top, 10);
        assert_eq!(config.name_resolver().policy(), &LabelPolicy::loose());
        Ok(())
    }

    #[test]
    fn custom_policy() -> Result<()> {
        let config: AppConfig = serde_json::from_str(
            r#"{ "label_policy": { "min_length": 1, "rejected_labels": ["launcher"] } }"#,
        )?;
        assert_eq!(
            LabelPolicy::from(config.label_policy),
            LabelPolicy {
                min_length: 1,
                rejected_labels: vec!["launcher".into()],
            }
        );
        Ok(())
    }

    #[test]
    fn broken_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json")?;
        assert!(AppConfig::load(dir.path()).is_err());
        Ok(())
    }
}
