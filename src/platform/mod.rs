//! Contains the capabilities timewell needs from a device: the usage-access flag, the usage
//! query and the package inventory. [Platform] bundles them so the rest of the crate never
//! talks to a device directly.

pub mod adb;
pub mod snapshot;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::usage::entities::{QueryWindow, UsageRecord};

/// Label declared through the package's string resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResourceLabel {
    #[default]
    Undeclared,
    Resolved(String),
    /// The package points at a resource that doesn't exist.
    Missing { resource: String },
}

/// What the inventory knows about an installed package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    /// Package has a launcher entry point.
    pub launchable: bool,
    pub resource_label: ResourceLabel,
    /// Generic application label.
    pub application_label: Option<String>,
}

impl PackageInfo {
    /// Resource label wins over the generic one. A resource that can't be resolved fails the
    /// label, the package itself stays valid.
    pub fn preferred_label(&self, package: &str) -> Result<Option<&str>, LookupError> {
        match &self.resource_label {
            ResourceLabel::Resolved(label) => Ok(Some(label.as_str())),
            ResourceLabel::Missing { resource } => Err(LookupError::MissingLabelResource {
                package: package.to_owned(),
                resource: resource.clone(),
            }),
            ResourceLabel::Undeclared => Ok(self.application_label.as_deref()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("package '{package}' not found")]
    NotFound { package: String },

    #[error("label resource '{resource}' of '{package}' is missing")]
    MissingLabelResource { package: String, resource: String },

    #[error("package lookup failed: {0}")]
    Backend(#[from] anyhow::Error),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsageAccess: Send + Sync {
    async fn is_usage_access_granted(&self) -> Result<bool>;

    /// Asks the device to show its usage-access settings screen. Nothing is reported back.
    async fn open_usage_access_settings(&self) -> Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Queries daily usage buckets for the window. `None` means the platform had nothing to
    /// report and is treated the same as an empty list.
    async fn query_usage(&self, window: QueryWindow) -> Result<Option<Vec<UsageRecord>>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PackageInventory: Send + Sync {
    async fn lookup_package(&self, package: &str) -> Result<PackageInfo, LookupError>;
}

/// Serves as the set of capabilities a refresh is run against.
#[derive(Clone)]
pub struct Platform {
    pub access: Arc<dyn UsageAccess>,
    pub source: Arc<dyn UsageSource>,
    pub inventory: Arc<dyn PackageInventory>,
}

impl Platform {
    pub fn new(
        access: Arc<dyn UsageAccess>,
        source: Arc<dyn UsageSource>,
        inventory: Arc<dyn PackageInventory>,
    ) -> Self {
        Self {
            access,
            source,
            inventory,
        }
    }

    /// Uses one backend for every capability.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: UsageAccess + UsageSource + PackageInventory + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            access: backend.clone(),
            source: backend.clone(),
            inventory: backend,
        }
    }
}
