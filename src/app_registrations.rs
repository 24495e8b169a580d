// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cleanup of application registrations created for the cluster.
//!
//! The installer creates a service principal per cluster and tags it
//! `kubernetes.io_cluster.<infraID>=owned`. Deleting the owning application object
//! removes the service principal with it.
//!
//! # Lookup
//!
//! 1. List service principals whose display name starts with the cluster ID
//! 2. Keep only those carrying the owned tag
//! 3. Resolve each one's application by `appId` and delete it
//!
//! Graph sometimes answers a list with `"value": null`; that is an empty result.

use crate::cloud_errors::{classify, is_malformed, CloudError, ErrorClass};
use crate::constants::{CLUSTER_TAG_OWNED, CLUSTER_TAG_PREFIX};
use crate::rest::RestClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Graph API version prefix.
const GRAPH_API_VERSION: &str = "v1.0";

/// Service principal as returned by Graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    /// Object ID
    pub id: String,
    /// Application (client) ID
    pub app_id: String,
    /// Display name; starts with the cluster ID for installer-created principals
    #[serde(default)]
    pub display_name: String,
    /// Free-form tags; `null` when none are set
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl ServicePrincipal {
    /// Returns true if this principal is tagged as owned by `cluster_id`.
    #[must_use]
    pub fn is_owned_by(&self, cluster_id: &str) -> bool {
        let owned = owned_tag(cluster_id);
        self.tags
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|tag| *tag == owned)
    }
}

/// Application object as returned by Graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Object ID, used to delete the application
    pub id: String,
    /// Application (client) ID
    pub app_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// `kubernetes.io_cluster.<cluster_id>=owned`
#[must_use]
pub fn owned_tag(cluster_id: &str) -> String {
    format!("{CLUSTER_TAG_PREFIX}{cluster_id}={CLUSTER_TAG_OWNED}")
}

/// Identity directory operations needed for cleanup.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Service principals whose display name starts with `display_name_prefix`.
    async fn service_principals(
        &self,
        display_name_prefix: &str,
    ) -> Result<Vec<ServicePrincipal>, CloudError>;

    /// Applications with the given application ID (normally zero or one).
    async fn applications_by_app_id(&self, app_id: &str) -> Result<Vec<Application>, CloudError>;

    /// Delete an application object.
    async fn delete_application(&self, object_id: &str) -> Result<(), CloudError>;
}

/// Microsoft Graph implementation of [`Directory`].
pub struct GraphDirectory {
    client: RestClient,
}

impl GraphDirectory {
    /// Create a directory backed by the Graph endpoint of `client`.
    #[must_use]
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

/// Quote a value for an OData string literal.
fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl Directory for GraphDirectory {
    async fn service_principals(
        &self,
        display_name_prefix: &str,
    ) -> Result<Vec<ServicePrincipal>, CloudError> {
        let url = self.client.url(&format!(
            "{GRAPH_API_VERSION}/servicePrincipals?$filter=startswith(displayName,{})",
            odata_literal(display_name_prefix)
        ))?;
        self.client.list_all(url).await
    }

    async fn applications_by_app_id(&self, app_id: &str) -> Result<Vec<Application>, CloudError> {
        let url = self.client.url(&format!(
            "{GRAPH_API_VERSION}/applications?$filter=appId eq {}",
            odata_literal(app_id)
        ))?;
        self.client.list_all(url).await
    }

    async fn delete_application(&self, object_id: &str) -> Result<(), CloudError> {
        let url = self
            .client
            .url(&format!("{GRAPH_API_VERSION}/applications/{object_id}"))?;
        self.client.delete(url).await.map(|_| ())
    }
}

/// Deletes the application registrations a cluster owns.
pub struct AppRegistrationCleaner<'a> {
    directory: &'a dyn Directory,
}

impl<'a> AppRegistrationCleaner<'a> {
    /// Create a cleaner over `directory`.
    #[must_use]
    pub fn new(directory: &'a dyn Directory) -> Self {
        Self { directory }
    }

    /// Delete every application registration owned by `cluster_id`.
    ///
    /// Entries are handled independently: an ambiguous lookup is logged and skipped,
    /// and other per-entry failures are collected and returned together after every
    /// entry has been tried.
    ///
    /// # Errors
    ///
    /// Returns the listing error, an authentication failure as soon as one is seen, or
    /// a [`CloudError::Aggregate`] of the entries that failed.
    pub async fn delete(&self, cluster_id: &str) -> Result<(), CloudError> {
        let principals = match self.directory.service_principals(cluster_id).await {
            Ok(principals) => principals,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.context("failed to list service principals")),
        };

        let owned: Vec<&ServicePrincipal> = principals
            .iter()
            .filter(|sp| sp.is_owned_by(cluster_id))
            .collect();

        debug!(
            cluster_id = cluster_id,
            listed = principals.len(),
            owned = owned.len(),
            "Found service principals"
        );

        let mut errors = Vec::new();
        for principal in owned {
            match self.delete_one(principal).await {
                Ok(()) => {}
                Err(e) if is_malformed(&e) => {
                    warn!(
                        app_id = %principal.app_id,
                        error = %e,
                        "Skipping ambiguous application registration"
                    );
                }
                Err(e) if classify(&e) == ErrorClass::Auth => return Err(e),
                Err(e) => {
                    warn!(app_id = %principal.app_id, error = %e, "Failed to delete application");
                    errors.push(e);
                }
            }
        }

        match CloudError::aggregate(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn delete_one(&self, principal: &ServicePrincipal) -> Result<(), CloudError> {
        let mut applications = match self
            .directory
            .applications_by_app_id(&principal.app_id)
            .await
        {
            Ok(apps) => apps,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                return Err(e.context(format!("failed to look up application {}", principal.app_id)));
            }
        };

        let application = match applications.len() {
            0 => {
                debug!(app_id = %principal.app_id, "Application already deleted");
                return Ok(());
            }
            1 => applications.remove(0),
            n => {
                return Err(CloudError::Malformed(format!(
                    "{n} applications match appId {}",
                    principal.app_id
                )));
            }
        };

        match self.directory.delete_application(&application.id).await {
            Ok(()) => {
                info!(
                    app_id = %application.app_id,
                    object_id = %application.id,
                    display_name = %principal.display_name,
                    "Deleted application registration"
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(app_id = %application.app_id, "Application already deleted");
                Ok(())
            }
            Err(e) if classify(&e) == ErrorClass::Auth => Err(e),
            Err(e) => Err(e.context(format!("failed to delete application {}", application.id))),
        }
    }
}

#[cfg(test)]
#[path = "app_registrations_tests.rs"]
mod app_registrations_tests;
