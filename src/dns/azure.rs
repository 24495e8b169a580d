// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure DNS backends.
//!
//! Both variants speak to Resource Manager through [`RestClient`] and share the same
//! wire shapes; they differ in which providers and API versions they use and in how they
//! pick cluster and candidate zones:
//!
//! | Variant | Cluster zones | Candidate zones |
//! |---------|---------------|-----------------|
//! | [`AzureDns`] | private zones in the cluster group (`privateDnsZones`, plus `dnszones` with `zoneType: Private`) | public `dnszones` across the subscription |
//! | [`AzureStackDns`] | every `dnszones` zone in the cluster group | `dnszones` in the base-domain group, or across the subscription |

use super::{resource_group_from_id, DnsBackend, RecordSet, RecordStore, Visibility, Zone, ZoneCatalog};
use crate::cloud_errors::CloudError;
use crate::constants::{
    DNS_API_VERSION, DNS_ZONES_PROVIDER, LIST_PAGE_SIZE, PRIVATE_DNS_API_VERSION,
    PRIVATE_DNS_ZONES_PROVIDER, STACK_DNS_API_VERSION,
};
use crate::rest::{DeleteOutcome, RestClient};
use crate::session::CloudEnvironment;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

/// Record listing segment for public and Stack zones.
const RECORD_SETS_SEGMENT: &str = "recordsets";

/// Record listing segment for private zones (all record types).
const PRIVATE_RECORD_SETS_SEGMENT: &str = "ALL";

/// Zone as returned by Resource Manager.
#[derive(Debug, Deserialize)]
struct ArmZone {
    id: String,
    name: String,
    #[serde(default)]
    properties: Option<ArmZoneProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmZoneProperties {
    #[serde(default)]
    zone_type: Option<String>,
}

/// Record set as returned by Resource Manager.
#[derive(Debug, Deserialize)]
struct ArmRecordSet {
    name: String,
    /// Resource type such as `Microsoft.Network/dnszones/A`
    #[serde(rename = "type")]
    resource_type: String,
}

/// Pick the DNS variant for a cloud environment.
#[must_use]
pub fn backend_for(
    cloud: &CloudEnvironment,
    client: RestClient,
    subscription_id: &str,
    base_domain_resource_group: Option<&str>,
) -> Box<dyn DnsBackend> {
    if cloud.is_stack() {
        info!(cloud = %cloud, "Using Azure Stack DNS");
        Box::new(AzureStackDns::new(
            client,
            subscription_id,
            base_domain_resource_group.map(str::to_string),
        ))
    } else {
        if let Some(rg) = base_domain_resource_group {
            debug!(
                base_domain_resource_group = rg,
                "Searching shared zones subscription-wide"
            );
        }
        Box::new(AzureDns::new(client, subscription_id))
    }
}

/// Zone and record calls shared by both variants.
#[derive(Clone)]
struct ArmDns {
    client: RestClient,
    subscription_id: String,
}

impl ArmDns {
    /// List zones of one provider, in a resource group or subscription-wide.
    ///
    /// `visibility` forces the visibility of every zone; otherwise `zoneType` decides.
    async fn list(
        &self,
        resource_group: Option<&str>,
        provider: &str,
        api_version: &str,
        visibility: Option<Visibility>,
    ) -> Result<Vec<Zone>, CloudError> {
        let scope = match resource_group {
            Some(rg) => format!(
                "subscriptions/{}/resourceGroups/{rg}/providers/{provider}",
                self.subscription_id
            ),
            None => format!(
                "subscriptions/{}/providers/{provider}",
                self.subscription_id
            ),
        };
        let url = self.client.url(&format!(
            "{scope}?api-version={api_version}&$top={LIST_PAGE_SIZE}"
        ))?;

        let zones = match self.client.list_all::<ArmZone>(url).await {
            Ok(zones) => zones,
            Err(e) if resource_group.is_some() && e.is_not_found() => {
                debug!(
                    resource_group = ?resource_group,
                    provider = provider,
                    "Resource group not found, no zones to list"
                );
                Vec::new()
            }
            Err(e) => return Err(e.context(format!("failed to list {provider}"))),
        };

        Ok(zones
            .into_iter()
            .map(|raw| into_zone(raw, resource_group, visibility))
            .collect())
    }

    async fn records(
        &self,
        zone: &Zone,
        segment: &str,
        api_version: &str,
    ) -> Result<Vec<RecordSet>, CloudError> {
        let url = self.client.url(&format!(
            "{}/{segment}?api-version={api_version}&$top={LIST_PAGE_SIZE}",
            zone.id
        ))?;

        let records = self.client.list_all::<ArmRecordSet>(url).await?;
        debug!(zone = %zone.name, count = records.len(), "Listed record sets");

        Ok(records
            .into_iter()
            .map(|raw| RecordSet {
                record_type: record_type_of(&raw.resource_type),
                name: raw.name,
                zone: zone.name.clone(),
            })
            .collect())
    }

    async fn delete(
        &self,
        zone: &Zone,
        record: &RecordSet,
        api_version: &str,
    ) -> Result<(), CloudError> {
        let url = self.client.url(&format!(
            "{}/{}/{}?api-version={api_version}",
            zone.id, record.record_type, record.name
        ))?;

        if let DeleteOutcome::Accepted(_) = self.client.delete(url).await? {
            debug!(zone = %zone.name, record = %record.name, "Record set delete accepted");
        }
        Ok(())
    }
}

fn into_zone(raw: ArmZone, resource_group: Option<&str>, visibility: Option<Visibility>) -> Zone {
    let visibility = visibility.unwrap_or_else(|| {
        match raw.properties.as_ref().and_then(|p| p.zone_type.as_deref()) {
            Some(t) if t.eq_ignore_ascii_case("Private") => Visibility::Private,
            _ => Visibility::Public,
        }
    });
    let resource_group = resource_group_from_id(&raw.id)
        .or_else(|| resource_group.map(str::to_string))
        .unwrap_or_default();

    Zone {
        id: raw.id,
        name: raw.name,
        resource_group,
        visibility,
    }
}

/// `Microsoft.Network/dnszones/A` -> `A`
fn record_type_of(resource_type: &str) -> String {
    resource_type
        .rsplit('/')
        .next()
        .unwrap_or(resource_type)
        .to_string()
}

fn is_private_dns_zone(zone: &Zone) -> bool {
    zone.id
        .to_ascii_lowercase()
        .contains(&format!("/{}/", PRIVATE_DNS_ZONES_PROVIDER.to_ascii_lowercase()))
}

// ============================================================================
// Standard Azure DNS
// ============================================================================

/// Public `dnszones` plus `privateDnsZones`.
#[derive(Clone)]
pub struct AzureDns {
    arm: ArmDns,
}

impl AzureDns {
    /// Create a backend for `subscription_id`.
    #[must_use]
    pub fn new(client: RestClient, subscription_id: impl Into<String>) -> Self {
        Self {
            arm: ArmDns {
                client,
                subscription_id: subscription_id.into(),
            },
        }
    }
}

#[async_trait]
impl ZoneCatalog for AzureDns {
    async fn list_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError> {
        let mut zones = self
            .arm
            .list(Some(resource_group), DNS_ZONES_PROVIDER, DNS_API_VERSION, None)
            .await?;
        zones.extend(
            self.arm
                .list(
                    Some(resource_group),
                    PRIVATE_DNS_ZONES_PROVIDER,
                    PRIVATE_DNS_API_VERSION,
                    Some(Visibility::Private),
                )
                .await?,
        );
        Ok(zones)
    }

    async fn list_zones_global(&self) -> Result<Vec<Zone>, CloudError> {
        self.arm
            .list(None, DNS_ZONES_PROVIDER, DNS_API_VERSION, None)
            .await
    }
}

#[async_trait]
impl RecordStore for AzureDns {
    async fn list_record_sets(&self, zone: &Zone) -> Result<Vec<RecordSet>, CloudError> {
        if is_private_dns_zone(zone) {
            self.arm
                .records(zone, PRIVATE_RECORD_SETS_SEGMENT, PRIVATE_DNS_API_VERSION)
                .await
        } else {
            self.arm
                .records(zone, RECORD_SETS_SEGMENT, DNS_API_VERSION)
                .await
        }
    }

    async fn delete_record_set(&self, zone: &Zone, record: &RecordSet) -> Result<(), CloudError> {
        let api_version = if is_private_dns_zone(zone) {
            PRIVATE_DNS_API_VERSION
        } else {
            DNS_API_VERSION
        };
        self.arm.delete(zone, record, api_version).await
    }
}

#[async_trait]
impl DnsBackend for AzureDns {
    async fn cluster_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError> {
        Ok(self
            .list_zones(resource_group)
            .await?
            .into_iter()
            .filter(|zone| zone.visibility == Visibility::Private)
            .collect())
    }

    async fn candidate_zones(&self) -> Result<Vec<Zone>, CloudError> {
        self.list_zones_global().await
    }
}

// ============================================================================
// Azure Stack Hub DNS
// ============================================================================

/// Legacy `dnszones` API as exposed by Azure Stack Hub, which has no private DNS.
#[derive(Clone)]
pub struct AzureStackDns {
    arm: ArmDns,
    base_domain_resource_group: Option<String>,
}

impl AzureStackDns {
    /// Create a backend for `subscription_id`.
    ///
    /// When `base_domain_resource_group` is set, shared zones are only searched there.
    #[must_use]
    pub fn new(
        client: RestClient,
        subscription_id: impl Into<String>,
        base_domain_resource_group: Option<String>,
    ) -> Self {
        Self {
            arm: ArmDns {
                client,
                subscription_id: subscription_id.into(),
            },
            base_domain_resource_group,
        }
    }
}

#[async_trait]
impl ZoneCatalog for AzureStackDns {
    async fn list_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError> {
        self.arm
            .list(
                Some(resource_group),
                DNS_ZONES_PROVIDER,
                STACK_DNS_API_VERSION,
                None,
            )
            .await
    }

    async fn list_zones_global(&self) -> Result<Vec<Zone>, CloudError> {
        self.arm
            .list(None, DNS_ZONES_PROVIDER, STACK_DNS_API_VERSION, None)
            .await
    }
}

#[async_trait]
impl RecordStore for AzureStackDns {
    async fn list_record_sets(&self, zone: &Zone) -> Result<Vec<RecordSet>, CloudError> {
        self.arm
            .records(zone, RECORD_SETS_SEGMENT, STACK_DNS_API_VERSION)
            .await
    }

    async fn delete_record_set(&self, zone: &Zone, record: &RecordSet) -> Result<(), CloudError> {
        self.arm.delete(zone, record, STACK_DNS_API_VERSION).await
    }
}

#[async_trait]
impl DnsBackend for AzureStackDns {
    async fn cluster_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError> {
        self.list_zones(resource_group).await
    }

    async fn candidate_zones(&self) -> Result<Vec<Zone>, CloudError> {
        match self.base_domain_resource_group.as_deref() {
            Some(rg) => self.list_zones(rg).await,
            None => self.list_zones_global().await,
        }
    }
}

#[cfg(test)]
#[path = "azure_tests.rs"]
mod azure_tests;
