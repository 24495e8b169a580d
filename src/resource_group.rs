// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deletion of the cluster's resource group.
//!
//! Resource Manager answers a resource group delete with `202 Accepted` and finishes it
//! in the background. [`AzureResourceGroups::delete`] waits for that operation, bounded
//! by a per-attempt timeout kept below the phase's own cap so a slow attempt still
//! leaves room for another.

use crate::cloud_errors::CloudError;
use crate::constants::{RESOURCE_GROUP_API_VERSION, RESOURCE_GROUP_DELETE_ATTEMPT_SECS};
use crate::rest::{DeleteOutcome, RestClient};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Deletes a resource group and everything in it.
#[async_trait]
pub trait ResourceGroupDeleter: Send + Sync {
    /// Delete `resource_group` and wait until the provider reports it gone.
    ///
    /// A group that does not exist counts as deleted.
    async fn delete(&self, resource_group: &str) -> Result<(), CloudError>;
}

/// Resource Manager implementation of [`ResourceGroupDeleter`].
pub struct AzureResourceGroups {
    client: RestClient,
    subscription_id: String,
    attempt_timeout: Duration,
}

impl AzureResourceGroups {
    /// Create a deleter for resource groups in `subscription_id`.
    #[must_use]
    pub fn new(client: RestClient, subscription_id: impl Into<String>) -> Self {
        Self {
            client,
            subscription_id: subscription_id.into(),
            attempt_timeout: Duration::from_secs(RESOURCE_GROUP_DELETE_ATTEMPT_SECS),
        }
    }

    /// Override how long one delete attempt waits for the long-running operation.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

#[async_trait]
impl ResourceGroupDeleter for AzureResourceGroups {
    async fn delete(&self, resource_group: &str) -> Result<(), CloudError> {
        let url = self.client.url(&format!(
            "subscriptions/{}/resourcegroups/{resource_group}?api-version={RESOURCE_GROUP_API_VERSION}",
            self.subscription_id
        ))?;

        let operation = match self.client.delete(url).await {
            Ok(DeleteOutcome::Completed) => {
                info!(resource_group = resource_group, "Deleted resource group");
                return Ok(());
            }
            Ok(DeleteOutcome::Accepted(operation)) => operation,
            Err(e) if e.is_not_found() => {
                info!(resource_group = resource_group, "Resource group already deleted");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        debug!(
            resource_group = resource_group,
            timeout = ?self.attempt_timeout,
            "Waiting for resource group deletion"
        );

        match self
            .client
            .wait_for_completion(&operation, self.attempt_timeout)
            .await
        {
            Ok(()) => {
                info!(resource_group = resource_group, "Deleted resource group");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!(resource_group = resource_group, "Resource group already deleted");
                Ok(())
            }
            Err(CloudError::Timeout { after, .. }) => Err(CloudError::Timeout {
                operation: format!("deletion of resource group {resource_group}"),
                after,
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "resource_group_tests.rs"]
mod resource_group_tests;
