// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS zones, record sets, and the provider capabilities used to clean them up.
//!
//! # Overview
//!
//! A cluster installs a private zone (e.g. `demo-1.example.com`) for its internal names.
//! Some of those names are also written into public zones that sit above it in the
//! domain hierarchy (e.g. `example.com`). Teardown removes those leaked copies:
//!
//! 1. [`DnsBackend::cluster_zones`] finds the zones the cluster owns
//! 2. [`DnsBackend::candidate_zones`] finds public zones that may hold leaked copies
//! 3. [`matcher`] orders the candidates from the closest ancestor outwards
//! 4. [`reconciler`] deletes record sets whose [`MatchKey`] appears in the cluster zone
//!
//! # Backends
//!
//! Two [`DnsBackend`] implementations exist, picked once per job from the cloud
//! environment (see [`azure::backend_for`]):
//!
//! - [`azure::AzureDns`] - public `dnszones` plus `privateDnsZones`
//! - [`azure::AzureStackDns`] - Azure Stack Hub, legacy `dnszones` only

pub mod azure;
pub mod matcher;
pub mod reconciler;

use crate::cloud_errors::CloudError;
use crate::constants::STRUCTURAL_RECORD_TYPES;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record name Azure uses for the zone apex.
const APEX_RECORD_NAME: &str = "@";

/// Whether a zone resolves on the internet or only inside a virtual network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Internet-resolvable
    Public,
    /// Resolvable only from linked virtual networks
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

/// A DNS zone as discovered from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider resource identifier, stable across listings
    pub id: String,
    /// Fully qualified zone name without a trailing dot
    pub name: String,
    /// Resource group the zone lives in
    pub resource_group: String,
    /// Public or private
    pub visibility: Visibility,
}

impl Zone {
    /// Returns true if the zone is internet-resolvable.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// A record set inside a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Name relative to the zone (`@` for the apex)
    pub name: String,
    /// Record type such as `A`, `CNAME`, `SOA`
    pub record_type: String,
    /// Name of the zone the record set belongs to
    pub zone: String,
}

impl RecordSet {
    /// Fully qualified name used to match this record against copies in other zones.
    #[must_use]
    pub fn match_key(&self) -> MatchKey {
        MatchKey::new(&self.name, &self.zone)
    }

    /// Returns true for SOA and NS record sets, which describe the zone itself.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        STRUCTURAL_RECORD_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&self.record_type))
    }
}

impl fmt::Display for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.match_key(), self.record_type)
    }
}

/// `<record-name>.<zone-name>`, normalised to lower case without a trailing dot.
///
/// Two record sets in different zones refer to the same DNS name exactly when their
/// match keys are equal, e.g. record `api` in `demo-1.example.com` and record
/// `api.demo-1` in `example.com` both have the key `api.demo-1.example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey(String);

impl MatchKey {
    /// Build the key for `record_name` inside `zone_name`.
    #[must_use]
    pub fn new(record_name: &str, zone_name: &str) -> Self {
        let zone = normalize_name(zone_name);
        let record = normalize_name(record_name);

        if record.is_empty() || record == APEX_RECORD_NAME {
            Self(zone)
        } else {
            Self(format!("{record}.{zone}"))
        }
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case a DNS name and drop any trailing dot.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Extract the resource group segment from an ARM resource identifier.
///
/// ```rust
/// use cluster_teardown::dns::resource_group_from_id;
///
/// let id = "/subscriptions/s/resourceGroups/demo-1-rg/providers/Microsoft.Network/dnszones/example.com";
/// assert_eq!(resource_group_from_id(id).as_deref(), Some("demo-1-rg"));
/// ```
#[must_use]
pub fn resource_group_from_id(id: &str) -> Option<String> {
    let mut segments = id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments
                .next()
                .filter(|rg| !rg.is_empty())
                .map(str::to_string);
        }
    }
    None
}

/// Enumerates zones reachable through the DNS API.
///
/// Every call re-pages from the provider. A resource group that no longer exists yields
/// an empty list rather than an error.
#[async_trait]
pub trait ZoneCatalog: Send + Sync {
    /// Zones inside one resource group.
    async fn list_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError>;

    /// Public zones across the whole subscription.
    async fn list_zones_global(&self) -> Result<Vec<Zone>, CloudError>;
}

/// Reads and deletes record sets.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record set in `zone`, in provider order.
    async fn list_record_sets(&self, zone: &Zone) -> Result<Vec<RecordSet>, CloudError>;

    /// Delete one record set by name and type.
    async fn delete_record_set(&self, zone: &Zone, record: &RecordSet) -> Result<(), CloudError>;
}

/// A complete DNS provider variant: zone discovery plus record access.
#[async_trait]
pub trait DnsBackend: ZoneCatalog + RecordStore {
    /// Zones the cluster created whose records may have leaked into shared zones.
    async fn cluster_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError>;

    /// Zones that may hold leaked copies of the cluster's records.
    async fn candidate_zones(&self) -> Result<Vec<Zone>, CloudError>;
}
