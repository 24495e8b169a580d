// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Cluster Teardown - Azure Footprint Removal
//!
//! Removes what an installer created in Azure for one cluster, within a fixed time
//! budget, and reports what could not be removed.
//!
//! ## Overview
//!
//! A teardown job runs three phases in order:
//!
//! - **DNS cleanup** - records the cluster wrote into shared public zones above its
//!   private zone are found by name and deleted
//! - **Resource group deletion** - the cluster resource group is deleted and waited on
//! - **Application registration cleanup** - applications whose service principals are
//!   tagged as owned by the cluster are deleted
//!
//! Every delete is idempotent: a target that is already gone counts as done, so a job
//! can simply be run again after a partial failure.
//!
//! ## Modules
//!
//! - [`cloud_errors`] - Cloud error type and its classification
//! - [`dns`] - Zones, record sets, ancestor matching and leaked-record cleanup
//! - [`resource_group`] - Resource group deletion
//! - [`app_registrations`] - Application registration cleanup
//! - [`orchestrator`] - Phase runner with deadline carry-over
//! - [`metadata`] - Cluster metadata input and the teardown job
//! - [`session`] - Cloud environment and credential handle
//! - [`rest`] - Resource Manager and Graph transport
//!
//! ## Example
//!
//! ```rust,no_run
//! use cluster_teardown::metadata::{ClusterMetadata, TeardownJob};
//! use cluster_teardown::orchestrator::{Orchestrator, TeardownConfig};
//! use cluster_teardown::session::Session;
//! use std::path::Path;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let metadata = ClusterMetadata::from_file(Path::new("metadata.json"))?;
//! let config = TeardownConfig::default();
//! let job = TeardownJob::from_metadata(&metadata, config.budget)?;
//! let session = Session::from_env(&job.cloud)?;
//!
//! let errors = Orchestrator::for_azure(job, config, &session)?.run().await;
//! if !errors.is_empty() {
//!     eprintln!("{errors}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod app_registrations;
pub mod cloud_errors;
pub mod constants;
pub mod dns;
pub mod metadata;
pub mod orchestrator;
pub mod resource_group;
pub mod rest;
pub mod session;

#[cfg(test)]
mod test_utils;
