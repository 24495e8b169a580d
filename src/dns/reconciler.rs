// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Removal of cluster records leaked into shared public zones.
//!
//! [`RecordReconciler::reconcile`] handles one cluster zone; [`clean_dns`] is the DNS
//! phase body that runs it over every cluster zone of a job.
//!
//! # Safety Rules
//!
//! - Only record sets whose [`MatchKey`](super::MatchKey) also exists in the cluster
//!   zone are deleted
//! - SOA and NS record sets are never deleted, on either side
//! - A zone is never a delete target for itself
//! - A record that is already gone counts as deleted

use super::matcher::{ancestors, public_zones_among};
use super::{DnsBackend, MatchKey, Zone};
use crate::cloud_errors::{classify, CloudError, ErrorClass};
use crate::metadata::TeardownJob;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What one reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Candidate zones that were scanned
    pub zones_scanned: usize,
    /// Record sets deleted
    pub deleted: usize,
    /// Record sets that were already gone when deleted
    pub already_gone: usize,
}

impl std::ops::AddAssign for ReconcileSummary {
    fn add_assign(&mut self, other: Self) {
        self.zones_scanned += other.zones_scanned;
        self.deleted += other.deleted;
        self.already_gone += other.already_gone;
    }
}

/// Deletes copies of a cluster zone's records from its ancestor public zones.
pub struct RecordReconciler<'a> {
    backend: &'a dyn DnsBackend,
}

impl<'a> RecordReconciler<'a> {
    /// Create a reconciler over `backend`.
    #[must_use]
    pub fn new(backend: &'a dyn DnsBackend) -> Self {
        Self { backend }
    }

    /// Reconcile one cluster zone against a listing of candidate zones.
    ///
    /// Candidate zones are visited closest ancestor first and their record sets in
    /// provider order.
    ///
    /// # Errors
    ///
    /// Authentication failures are returned as soon as they are seen. Any other failed
    /// delete is returned with the zone and record name attached; the caller retries
    /// the whole pass.
    pub async fn reconcile(
        &self,
        cluster_zone: &Zone,
        candidate_zones: &[Zone],
    ) -> Result<ReconcileSummary, CloudError> {
        let mut summary = ReconcileSummary::default();

        let match_set = match self.match_set(cluster_zone).await? {
            Some(set) if !set.is_empty() => set,
            _ => {
                debug!(zone = %cluster_zone.name, "No records to match, skipping zone");
                return Ok(summary);
            }
        };

        let targets: Vec<Zone> = public_zones_among(&ancestors(&cluster_zone.name), candidate_zones)
            .into_iter()
            .filter(|zone| zone.id != cluster_zone.id)
            .collect();

        debug!(
            zone = %cluster_zone.name,
            match_keys = match_set.len(),
            targets = targets.len(),
            "Reconciling cluster zone"
        );

        for target in &targets {
            summary += self.clean_zone(target, &match_set).await?;
        }

        Ok(summary)
    }

    /// Match keys of the cluster zone's non-structural record sets.
    ///
    /// `None` if the zone has already been deleted.
    async fn match_set(&self, zone: &Zone) -> Result<Option<HashSet<MatchKey>>, CloudError> {
        let records = match self.backend.list_record_sets(zone).await {
            Ok(records) => records,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.context(format!("failed to list records in {}", zone.name))),
        };

        Ok(Some(
            records
                .iter()
                .filter(|record| !record.is_structural())
                .map(super::RecordSet::match_key)
                .collect(),
        ))
    }

    async fn clean_zone(
        &self,
        target: &Zone,
        match_set: &HashSet<MatchKey>,
    ) -> Result<ReconcileSummary, CloudError> {
        let mut summary = ReconcileSummary {
            zones_scanned: 1,
            ..ReconcileSummary::default()
        };

        let records = match self.backend.list_record_sets(target).await {
            Ok(records) => records,
            Err(e) if e.is_not_found() => {
                debug!(zone = %target.name, "Candidate zone is gone, nothing to clean");
                return Ok(summary);
            }
            Err(e) => {
                return Err(e.context(format!("failed to list records in {}", target.name)));
            }
        };

        for record in records
            .iter()
            .filter(|record| !record.is_structural())
            .filter(|record| match_set.contains(&record.match_key()))
        {
            match self.backend.delete_record_set(target, record).await {
                Ok(()) => {
                    info!(
                        zone = %target.name,
                        record = %record.name,
                        record_type = %record.record_type,
                        "Deleted leaked record set"
                    );
                    summary.deleted += 1;
                }
                Err(e) => match classify(&e) {
                    ErrorClass::NotFound => {
                        debug!(zone = %target.name, record = %record.name, "Record set already deleted");
                        summary.already_gone += 1;
                    }
                    ErrorClass::Auth => return Err(e),
                    ErrorClass::Blocked | ErrorClass::Transient => {
                        return Err(e.context(format!(
                            "failed to delete record set {} {} in zone {}",
                            record.name, record.record_type, target.name
                        )));
                    }
                },
            }
        }

        Ok(summary)
    }
}

/// DNS phase body: reconcile every cluster zone of `job`.
///
/// # Errors
///
/// Returns the first error from zone discovery or reconciliation.
pub async fn clean_dns(backend: &dyn DnsBackend, job: &TeardownJob) -> Result<(), CloudError> {
    let cluster_zones = backend.cluster_zones(&job.resource_group).await?;
    if cluster_zones.is_empty() {
        info!(resource_group = %job.resource_group, "No cluster DNS zones found");
        return Ok(());
    }

    let candidates = backend
        .candidate_zones()
        .await
        .map_err(|e| e.context("failed to list shared DNS zones"))?;

    let reconciler = RecordReconciler::new(backend);
    let mut total = ReconcileSummary::default();

    for zone in &cluster_zones {
        let summary = reconciler.reconcile(zone, &candidates).await.inspect_err(|e| {
            warn!(zone = %zone.name, error = %e, "Failed to clean leaked records");
        })?;
        total += summary;
    }

    info!(
        cluster_zones = cluster_zones.len(),
        zones_scanned = total.zones_scanned,
        deleted = total.deleted,
        already_gone = total.already_gone,
        "DNS cleanup complete"
    );
    Ok(())
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
