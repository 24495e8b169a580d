// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster metadata input and the teardown job built from it.
//!
//! The installer writes a `metadata.json` next to its assets when it creates a cluster.
//! Only the fields needed to find the cluster's Azure footprint are read here:
//!
//! ```json
//! {
//!   "clusterName": "demo",
//!   "infraID": "demo-1",
//!   "azure": {
//!     "cloudName": "AzurePublicCloud",
//!     "region": "eastus",
//!     "resourceGroupName": "",
//!     "baseDomainResourceGroupName": "dns-shared"
//!   }
//! }
//! ```

use crate::constants::{DEFAULT_RESOURCE_GROUP_SUFFIX, MAX_TEARDOWN_BUDGET_SECS};
use crate::session::CloudEnvironment;
use anyhow::{bail, Context as _, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Cluster metadata as written by the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// Human-facing cluster name
    #[serde(default)]
    pub cluster_name: String,

    /// Infrastructure identifier; every cloud resource name and tag is derived from it
    #[serde(rename = "infraID")]
    pub infra_id: String,

    /// Azure platform section
    pub azure: AzureMetadata,
}

/// Azure-specific section of [`ClusterMetadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureMetadata {
    /// Cloud name (`AzurePublicCloud`, `AzureUSGovernmentCloud`, `AzureChinaCloud`, `AzureStackCloud`)
    #[serde(default)]
    pub cloud_name: String,

    /// Resource Manager endpoint, required for Azure Stack Hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arm_endpoint: Option<String>,

    /// Region the cluster was installed into
    #[serde(default)]
    pub region: String,

    /// Cluster resource group; `<infraID>-rg` when empty
    #[serde(default)]
    pub resource_group_name: String,

    /// Resource group holding the base domain's public zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_domain_resource_group_name: Option<String>,
}

impl ClusterMetadata {
    /// Load metadata from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cluster metadata {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("failed to parse cluster metadata {}", path.display()))
    }

    /// Decode metadata from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or `infraID` is empty.
    pub fn from_json(raw: &str) -> Result<Self> {
        let metadata: Self = serde_json::from_str(raw)?;
        if metadata.infra_id.trim().is_empty() {
            bail!("cluster metadata has an empty infraID");
        }
        Ok(metadata)
    }

    /// Cluster resource group, defaulting to `<infraID>-rg`.
    #[must_use]
    pub fn resource_group(&self) -> String {
        if self.azure.resource_group_name.is_empty() {
            format!("{}{DEFAULT_RESOURCE_GROUP_SUFFIX}", self.infra_id)
        } else {
            self.azure.resource_group_name.clone()
        }
    }

    /// Cloud environment the cluster lives in.
    ///
    /// # Errors
    ///
    /// Returns an error if the cloud name is unknown or a Stack cloud lacks its endpoint.
    pub fn cloud(&self) -> Result<CloudEnvironment> {
        CloudEnvironment::from_metadata(&self.azure.cloud_name, self.azure.arm_endpoint.as_deref())
    }
}

/// One cluster's teardown: what to delete and by when.
///
/// Built once at process start and read-only afterwards.
#[derive(Debug, Clone)]
pub struct TeardownJob {
    /// Infrastructure identifier of the cluster
    pub cluster_id: String,
    /// Cluster resource group
    pub resource_group: String,
    /// Resource group holding the base domain's public zone, if known
    pub base_domain_resource_group: Option<String>,
    /// Cloud environment
    pub cloud: CloudEnvironment,
    /// Monotonic deadline shared by every phase
    pub deadline: Instant,
    /// Wall-clock rendering of [`Self::deadline`] for operators
    pub deadline_at: DateTime<Utc>,
}

impl TeardownJob {
    /// Build a job whose deadline is `budget` from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata names an unknown cloud.
    pub fn from_metadata(metadata: &ClusterMetadata, budget: Duration) -> Result<Self> {
        Ok(Self::new(
            metadata.infra_id.clone(),
            metadata.resource_group(),
            metadata
                .azure
                .base_domain_resource_group_name
                .clone()
                .filter(|rg| !rg.is_empty()),
            metadata.cloud()?,
            budget,
        ))
    }

    /// Build a job directly.
    ///
    /// `budget` is clamped to [`MAX_TEARDOWN_BUDGET_SECS`].
    #[must_use]
    pub fn new(
        cluster_id: impl Into<String>,
        resource_group: impl Into<String>,
        base_domain_resource_group: Option<String>,
        cloud: CloudEnvironment,
        budget: Duration,
    ) -> Self {
        let budget = budget.min(Duration::from_secs(MAX_TEARDOWN_BUDGET_SECS));
        let deadline_at = chrono::Duration::from_std(budget)
            .ok()
            .and_then(|b| Utc::now().checked_add_signed(b))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            cluster_id: cluster_id.into(),
            resource_group: resource_group.into(),
            base_domain_resource_group,
            cloud,
            deadline: Instant::now() + budget,
            deadline_at,
        }
    }

    /// Time left before the overall deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod metadata_tests;
