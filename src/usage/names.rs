//! Turns package identifiers into names a person recognizes.
//!
//! Resolution walks [NAME_SOURCES] in order and stops at the first source that produces a name.
//! Platform labels are screened by [LABEL_RULES] first, because some apps ship placeholder labels
//! that are worse than the synthetic fallback.

use std::collections::BTreeMap;

use clap::ValueEnum;
use tracing::{debug, trace};

use crate::platform::PackageInventory;

const DEFAULT_KNOWN_NAMES: [(&str, &str); 4] = [
    ("com.facebook.katana", "Facebook"),
    ("com.instagram.android", "Instagram"),
    ("com.whatsapp", "WhatsApp"),
    ("com.snapchat.android", "Snapchat"),
];

/// Brand names that are used instead of whatever the platform reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownNames(BTreeMap<String, String>);

impl Default for KnownNames {
    fn default() -> Self {
        Self(
            DEFAULT_KNOWN_NAMES
                .iter()
                .map(|(package, name)| (package.to_string(), name.to_string()))
                .collect(),
        )
    }
}

impl KnownNames {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds or replaces entries.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = (String, String)>) -> Self {
        self.0.extend(entries);
        self
    }

    pub fn get(&self, package: &str) -> Option<&str> {
        self.0.get(package).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyPreset {
    Strict,
    Loose,
}

/// Decides which platform labels are trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPolicy {
    /// Labels with at most this many characters are rejected.
    pub min_length: usize,
    /// Compared case-insensitively.
    pub rejected_labels: Vec<String>,
}

impl LabelPolicy {
    pub fn strict() -> Self {
        Self {
            min_length: 3,
            rejected_labels: vec!["android".into(), "katana".into(), "insta".into()],
        }
    }

    pub fn loose() -> Self {
        Self {
            min_length: 2,
            rejected_labels: vec!["android".into()],
        }
    }

    /// Returns the first rule that rejects `label`.
    pub fn rejection(&self, label: &str) -> Option<LabelRule> {
        LABEL_RULES
            .into_iter()
            .find(|rule| rule.rejects(self, label))
    }
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

impl From<PolicyPreset> for LabelPolicy {
    fn from(value: PolicyPreset) -> Self {
        match value {
            PolicyPreset::Strict => Self::strict(),
            PolicyPreset::Loose => Self::loose(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRule {
    Blank,
    Generic,
    TooShort,
}

pub const LABEL_RULES: [LabelRule; 3] = [LabelRule::Blank, LabelRule::Generic, LabelRule::TooShort];

impl LabelRule {
    pub fn rejects(&self, policy: &LabelPolicy, label: &str) -> bool {
        let label = label.trim();
        match self {
            LabelRule::Blank => label.is_empty(),
            LabelRule::Generic => policy
                .rejected_labels
                .iter()
                .any(|rejected| rejected.eq_ignore_ascii_case(label)),
            LabelRule::TooShort => label.chars().count() <= policy.min_length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    KnownName,
    PlatformLabel,
    PackageSegment,
}

pub const NAME_SOURCES: [NameSource; 3] = [
    NameSource::KnownName,
    NameSource::PlatformLabel,
    NameSource::PackageSegment,
];

#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    known: KnownNames,
    policy: LabelPolicy,
}

impl NameResolver {
    pub fn new(known: KnownNames, policy: LabelPolicy) -> Self {
        Self { known, policy }
    }

    pub fn known(&self) -> &KnownNames {
        &self.known
    }

    pub fn policy(&self) -> &LabelPolicy {
        &self.policy
    }

    /// Always produces a name. Only an empty identifier can produce an empty one.
    pub async fn resolve_name(&self, package: &str, inventory: &dyn PackageInventory) -> String {
        for source in NAME_SOURCES {
            if let Some(name) = self.from_source(source, package, inventory).await {
                trace!("Resolved {package} to {name} using {source:?}");
                return name;
            }
        }
        package.to_owned()
    }

    async fn from_source(
        &self,
        source: NameSource,
        package: &str,
        inventory: &dyn PackageInventory,
    ) -> Option<String> {
        match source {
            NameSource::KnownName => self.known.get(package).map(str::to_owned),
            NameSource::PlatformLabel => self.platform_label(package, inventory).await,
            NameSource::PackageSegment => fallback_label(package),
        }
    }

    async fn platform_label(
        &self,
        package: &str,
        inventory: &dyn PackageInventory,
    ) -> Option<String> {
        let info = match inventory.lookup_package(package).await {
            Ok(info) => info,
            Err(e) => {
                debug!("No label for {package}: {e}");
                return None;
            }
        };
        let label = match info.preferred_label(package) {
            Ok(label) => label?,
            Err(e) => {
                debug!("No label for {package}: {e}");
                return None;
            }
        };
        match self.policy.rejection(label) {
            Some(rule) => {
                debug!("Rejected label '{label}' of {package} ({rule:?})");
                None
            }
            None => Some(label.to_owned()),
        }
    }
}

/// Last dot separated segment of the package with its first character uppercased.
pub fn fallback_label(package: &str) -> Option<String> {
    let segment = package.rsplit('.').next().filter(|s| !s.is_empty())?;
    let mut chars = segment.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
