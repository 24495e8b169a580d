// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloud environment selection and the pre-authenticated session handle.
//!
//! Token acquisition and refresh happen outside this crate. A [`Session`] only carries
//! bearer tokens that are already valid, the subscription and tenant they apply to, and
//! the endpoints of the selected [`CloudEnvironment`].

use crate::constants::{
    CHINA_CLOUD_ARM_ENDPOINT, CHINA_CLOUD_GRAPH_ENDPOINT, ENV_ACCESS_TOKEN, ENV_ARM_ENDPOINT,
    ENV_GRAPH_ACCESS_TOKEN, ENV_GRAPH_ENDPOINT, ENV_SUBSCRIPTION_ID, ENV_TENANT_ID,
    PUBLIC_CLOUD_ARM_ENDPOINT, PUBLIC_CLOUD_GRAPH_ENDPOINT, US_GOVERNMENT_ARM_ENDPOINT,
    US_GOVERNMENT_GRAPH_ENDPOINT,
};
use anyhow::{bail, Context as _, Result};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Azure cloud the cluster was installed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudEnvironment {
    /// Azure public cloud
    Public,
    /// Azure US Government
    UsGovernment,
    /// Azure China (21Vianet)
    China,
    /// Azure Stack Hub, reached through its own Resource Manager endpoint
    Stack {
        /// Resource Manager endpoint of the Stack Hub instance
        arm_endpoint: Url,
    },
}

impl CloudEnvironment {
    /// Resolve a cloud name as written in cluster metadata.
    ///
    /// `arm_endpoint` is required for `AzureStackCloud` and ignored otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown, or if a Stack cloud has no valid endpoint.
    pub fn from_metadata(cloud_name: &str, arm_endpoint: Option<&str>) -> Result<Self> {
        match cloud_name {
            "" | "AzurePublicCloud" => Ok(Self::Public),
            "AzureUSGovernmentCloud" => Ok(Self::UsGovernment),
            "AzureChinaCloud" => Ok(Self::China),
            "AzureStackCloud" => {
                let Some(endpoint) = arm_endpoint.filter(|e| !e.is_empty()) else {
                    bail!("cloud AzureStackCloud requires armEndpoint in cluster metadata");
                };
                let arm_endpoint = parse_endpoint(endpoint)
                    .with_context(|| format!("invalid armEndpoint {endpoint}"))?;
                Ok(Self::Stack { arm_endpoint })
            }
            other => bail!("unknown Azure cloud name {other:?}"),
        }
    }

    /// Returns true if this is an Azure Stack Hub environment.
    #[must_use]
    pub fn is_stack(&self) -> bool {
        matches!(self, Self::Stack { .. })
    }

    /// Default Resource Manager endpoint for this cloud.
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in endpoint constant fails to parse.
    pub fn arm_endpoint(&self) -> Result<Url> {
        match self {
            Self::Public => parse_endpoint(PUBLIC_CLOUD_ARM_ENDPOINT),
            Self::UsGovernment => parse_endpoint(US_GOVERNMENT_ARM_ENDPOINT),
            Self::China => parse_endpoint(CHINA_CLOUD_ARM_ENDPOINT),
            Self::Stack { arm_endpoint } => Ok(arm_endpoint.clone()),
        }
    }

    /// Default Graph endpoint for this cloud.
    ///
    /// Stack Hub identities live in the public tenant, so it shares the public Graph endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in endpoint constant fails to parse.
    pub fn graph_endpoint(&self) -> Result<Url> {
        match self {
            Self::Public | Self::Stack { .. } => parse_endpoint(PUBLIC_CLOUD_GRAPH_ENDPOINT),
            Self::UsGovernment => parse_endpoint(US_GOVERNMENT_GRAPH_ENDPOINT),
            Self::China => parse_endpoint(CHINA_CLOUD_GRAPH_ENDPOINT),
        }
    }
}

impl fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("AzurePublicCloud"),
            Self::UsGovernment => f.write_str("AzureUSGovernmentCloud"),
            Self::China => f.write_str("AzureChinaCloud"),
            Self::Stack { .. } => f.write_str("AzureStackCloud"),
        }
    }
}

impl FromStr for CloudEnvironment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_metadata(s, None)
    }
}

/// Parse an endpoint and make sure it ends with `/` so relative joins keep its path.
///
/// # Errors
///
/// Returns an error if the string is not an absolute URL.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let normalized = if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{endpoint}/")
    };
    Url::parse(&normalized).with_context(|| format!("failed to parse endpoint {endpoint}"))
}

/// Pre-authenticated handle to one subscription.
#[derive(Clone)]
pub struct Session {
    /// Subscription holding the cluster resources
    pub subscription_id: String,
    /// Tenant holding the cluster's identity objects
    pub tenant_id: String,
    /// Resource Manager endpoint
    pub arm_endpoint: Url,
    /// Graph endpoint
    pub graph_endpoint: Url,
    arm_token: String,
    graph_token: String,
}

impl Session {
    /// Build a session from already-acquired tokens.
    #[must_use]
    pub fn new(
        subscription_id: impl Into<String>,
        tenant_id: impl Into<String>,
        arm_endpoint: Url,
        graph_endpoint: Url,
        arm_token: impl Into<String>,
        graph_token: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            tenant_id: tenant_id.into(),
            arm_endpoint,
            graph_endpoint,
            arm_token: arm_token.into(),
            graph_token: graph_token.into(),
        }
    }

    /// Build a session from environment variables.
    ///
    /// Reads `AZURE_SUBSCRIPTION_ID`, `AZURE_TENANT_ID` and `AZURE_ACCESS_TOKEN`.
    /// `AZURE_GRAPH_ACCESS_TOKEN` falls back to the Resource Manager token, and the
    /// `AZURE_RESOURCE_MANAGER_ENDPOINT` / `AZURE_GRAPH_ENDPOINT` overrides win over
    /// the cloud's defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or an endpoint is invalid.
    pub fn from_env(cloud: &CloudEnvironment) -> Result<Self> {
        Self::from_lookup(cloud, |key| std::env::var(key).ok())
    }

    /// Build a session from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or an endpoint is invalid.
    pub fn from_lookup<F>(cloud: &CloudEnvironment, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("environment variable {key} must be set"))
        };

        let subscription_id = required(ENV_SUBSCRIPTION_ID)?;
        let tenant_id = required(ENV_TENANT_ID)?;
        let arm_token = required(ENV_ACCESS_TOKEN)?;
        let graph_token = lookup(ENV_GRAPH_ACCESS_TOKEN)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| arm_token.clone());

        let arm_endpoint = match lookup(ENV_ARM_ENDPOINT).filter(|v| !v.is_empty()) {
            Some(endpoint) => parse_endpoint(&endpoint)?,
            None => cloud.arm_endpoint()?,
        };
        let graph_endpoint = match lookup(ENV_GRAPH_ENDPOINT).filter(|v| !v.is_empty()) {
            Some(endpoint) => parse_endpoint(&endpoint)?,
            None => cloud.graph_endpoint()?,
        };

        Ok(Self::new(
            subscription_id,
            tenant_id,
            arm_endpoint,
            graph_endpoint,
            arm_token,
            graph_token,
        ))
    }

    /// Bearer token for Resource Manager calls.
    #[must_use]
    pub fn arm_token(&self) -> &str {
        &self.arm_token
    }

    /// Bearer token for Graph calls.
    #[must_use]
    pub fn graph_token(&self) -> &str {
        &self.graph_token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("arm_endpoint", &self.arm_endpoint.as_str())
            .field("graph_endpoint", &self.graph_endpoint.as_str())
            .field("arm_token", &"<redacted>")
            .field("graph_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
