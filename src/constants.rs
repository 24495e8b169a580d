// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for cluster teardown.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Teardown Budget Constants
// ============================================================================

/// Overall time budget shared by every phase of one teardown job (120 minutes)
pub const TEARDOWN_BUDGET_SECS: u64 = 120 * 60;

/// Longest budget a job accepts; larger requests are clamped (30 days)
pub const MAX_TEARDOWN_BUDGET_SECS: u64 = 30 * 24 * 60 * 60;

/// Interval between attempts of a phase body (1 second)
pub const PHASE_POLL_INTERVAL_SECS: u64 = 1;

/// Cap on the DNS cleanup phase (10 minutes)
pub const DNS_PHASE_TIMEOUT_SECS: u64 = 10 * 60;

/// Cap on the resource group deletion phase (30 minutes)
pub const RESOURCE_GROUP_PHASE_TIMEOUT_SECS: u64 = 30 * 60;

/// How long one resource group delete attempt waits for the long-running operation (20 minutes)
///
/// Must stay below [`RESOURCE_GROUP_PHASE_TIMEOUT_SECS`] so the phase gets a second attempt.
pub const RESOURCE_GROUP_DELETE_ATTEMPT_SECS: u64 = 20 * 60;

// ============================================================================
// HTTP Constants
// ============================================================================

/// Timeout for a single HTTP request to Resource Manager or Graph (60 seconds)
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Long-Running Operation Constants
// ============================================================================

/// Default delay between polls of a long-running operation when the service sends no `Retry-After`
pub const LRO_DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Upper bound applied to a service-provided `Retry-After`
pub const LRO_MAX_POLL_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Azure Resource Manager Constants
// ============================================================================

/// Page size requested from list operations
pub const LIST_PAGE_SIZE: u32 = 100;

/// API version for public DNS zones and record sets
pub const DNS_API_VERSION: &str = "2018-05-01";

/// API version for private DNS zones and record sets
pub const PRIVATE_DNS_API_VERSION: &str = "2018-09-01";

/// API version for DNS on Azure Stack Hub (legacy profile)
pub const STACK_DNS_API_VERSION: &str = "2016-04-01";

/// API version for resource groups
pub const RESOURCE_GROUP_API_VERSION: &str = "2021-04-01";

/// Resource provider path segment for public DNS zones
pub const DNS_ZONES_PROVIDER: &str = "Microsoft.Network/dnszones";

/// Resource provider path segment for private DNS zones
pub const PRIVATE_DNS_ZONES_PROVIDER: &str = "Microsoft.Network/privateDnsZones";

// ============================================================================
// Cloud Endpoint Constants
// ============================================================================

/// Resource Manager endpoint for the Azure public cloud
pub const PUBLIC_CLOUD_ARM_ENDPOINT: &str = "https://management.azure.com/";

/// Graph endpoint for the Azure public cloud
pub const PUBLIC_CLOUD_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/";

/// Resource Manager endpoint for Azure US Government
pub const US_GOVERNMENT_ARM_ENDPOINT: &str = "https://management.usgovcloudapi.net/";

/// Graph endpoint for Azure US Government
pub const US_GOVERNMENT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.us/";

/// Resource Manager endpoint for Azure China
pub const CHINA_CLOUD_ARM_ENDPOINT: &str = "https://management.chinacloudapi.cn/";

/// Graph endpoint for Azure China
pub const CHINA_CLOUD_GRAPH_ENDPOINT: &str = "https://microsoftgraph.chinacloudapi.cn/";

// ============================================================================
// Cluster Ownership Constants
// ============================================================================

/// Suffix appended to the infrastructure ID when metadata names no resource group
pub const DEFAULT_RESOURCE_GROUP_SUFFIX: &str = "-rg";

/// Tag key prefix marking identity objects created for a cluster
pub const CLUSTER_TAG_PREFIX: &str = "kubernetes.io_cluster.";

/// Tag value marking identity objects the cluster owns
pub const CLUSTER_TAG_OWNED: &str = "owned";

// ============================================================================
// DNS Constants
// ============================================================================

/// Record types that describe the zone itself and are never cleaned up
pub const STRUCTURAL_RECORD_TYPES: [&str; 2] = ["SOA", "NS"];

// ============================================================================
// Environment Variable Constants
// ============================================================================

/// Subscription that owns the cluster resources
pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";

/// Tenant that owns the identity objects
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";

/// Bearer token for Resource Manager calls
pub const ENV_ACCESS_TOKEN: &str = "AZURE_ACCESS_TOKEN";

/// Bearer token for Graph calls (falls back to [`ENV_ACCESS_TOKEN`])
pub const ENV_GRAPH_ACCESS_TOKEN: &str = "AZURE_GRAPH_ACCESS_TOKEN";

/// Override for the Resource Manager endpoint
pub const ENV_ARM_ENDPOINT: &str = "AZURE_RESOURCE_MANAGER_ENDPOINT";

/// Override for the Graph endpoint
pub const ENV_GRAPH_ENDPOINT: &str = "AZURE_GRAPH_ENDPOINT";
