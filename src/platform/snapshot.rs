//! Platform backed by a captured JSON document instead of a live device. Useful for replaying a
//! device state and for tests.

use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::usage::entities::{QueryWindow, UsageRecord};

use super::{
    LookupError, PackageInfo, PackageInventory, ResourceLabel, UsageAccess, UsageSource,
};

/// One daily usage bucket as reported by the platform.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct UsageBucketEntity {
    pub package: Arc<str>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end: DateTime<Utc>,
    pub foreground_ms: u64,
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct PackageEntity {
    pub package: String,
    #[serde(default)]
    pub launchable: bool,
    #[serde(default)]
    pub application_label: Option<String>,
    /// Key into [SnapshotDocument::strings].
    #[serde(default)]
    pub label_resource: Option<String>,
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub usage_access_granted: bool,
    /// `null` mirrors a platform query that returned nothing at all.
    #[serde(default)]
    pub buckets: Option<Vec<UsageBucketEntity>>,
    #[serde(default)]
    pub packages: Vec<PackageEntity>,
    #[serde(default)]
    pub strings: HashMap<String, String>,
}

pub struct SnapshotPlatform {
    document: SnapshotDocument,
}

impl SnapshotPlatform {
    pub fn new(document: SnapshotDocument) -> Self {
        Self { document }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot {path:?}"))?;
        let document = serde_json::from_str::<SnapshotDocument>(&content)
            .with_context(|| format!("Snapshot {path:?} is not valid"))?;
        debug!(
            "Loaded snapshot with {} packages",
            document.packages.len()
        );
        Ok(Self::new(document))
    }
}

#[async_trait]
impl UsageAccess for SnapshotPlatform {
    async fn is_usage_access_granted(&self) -> Result<bool> {
        Ok(self.document.usage_access_granted)
    }

    async fn open_usage_access_settings(&self) -> Result<()> {
        info!("Snapshot has no settings screen to open");
        Ok(())
    }
}

#[async_trait]
impl UsageSource for SnapshotPlatform {
    async fn query_usage(&self, window: QueryWindow) -> Result<Option<Vec<UsageRecord>>> {
        Ok(self.document.buckets.as_ref().map(|buckets| {
            buckets
                .iter()
                .filter(|bucket| window.overlaps(bucket.start, bucket.end))
                .map(|bucket| UsageRecord::new(bucket.package.clone(), bucket.foreground_ms))
                .collect()
        }))
    }
}

#[async_trait]
impl PackageInventory for SnapshotPlatform {
    async fn lookup_package(&self, package: &str) -> Result<PackageInfo, LookupError> {
        let entity = self
            .document
            .packages
            .iter()
            .find(|entity| entity.package == package)
            .ok_or_else(|| LookupError::NotFound {
                package: package.to_owned(),
            })?;

        let resource_label = match &entity.label_resource {
            Some(resource) => match self.document.strings.get(resource) {
                Some(label) => ResourceLabel::Resolved(label.clone()),
                None => ResourceLabel::Missing {
                    resource: resource.clone(),
                },
            },
            None => ResourceLabel::Undeclared,
        };

        Ok(PackageInfo {
            launchable: entity.launchable,
            resource_label,
            application_label: entity.application_label.clone(),
        })
    }
}
