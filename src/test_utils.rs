// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory provider fakes shared by unit tests.

use crate::app_registrations::{Application, Directory, ServicePrincipal};
use crate::cloud_errors::CloudError;
use crate::dns::{DnsBackend, RecordSet, RecordStore, Visibility, Zone, ZoneCatalog};
use crate::resource_group::ResourceGroupDeleter;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn zone(id: &str, name: &str, resource_group: &str, visibility: Visibility) -> Zone {
    Zone {
        id: id.to_string(),
        name: name.to_string(),
        resource_group: resource_group.to_string(),
        visibility,
    }
}

pub fn record(name: &str, record_type: &str, zone: &str) -> RecordSet {
    RecordSet {
        name: name.to_string(),
        record_type: record_type.to_string(),
        zone: zone.to_string(),
    }
}

// ============================================================================
// DNS
// ============================================================================

/// DNS provider holding zones and their record sets in memory.
///
/// Deletes remove the record from the store, so a second pass sees it gone.
#[derive(Default)]
pub struct FakeDns {
    zones: Mutex<Vec<Zone>>,
    records: Mutex<HashMap<String, Vec<RecordSet>>>,
    delete_errors: Mutex<HashMap<(String, String), VecDeque<CloudError>>>,
    list_error: Mutex<Option<CloudError>>,
    deleted: Mutex<Vec<(String, String, String)>>,
}

impl FakeDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(self, zone: Zone, records: Vec<RecordSet>) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert(zone.id.clone(), records);
        self.zones.lock().unwrap().push(zone);
        self
    }

    /// Queue an error for the next delete of `record` in the zone with `zone_id`.
    pub fn fail_delete(self, zone_id: &str, record: &str, err: CloudError) -> Self {
        self.delete_errors
            .lock()
            .unwrap()
            .entry((zone_id.to_string(), record.to_string()))
            .or_default()
            .push_back(err);
        self
    }

    /// Make every zone listing fail with `err` until cleared.
    pub fn fail_listing(&self, err: Option<CloudError>) {
        *self.list_error.lock().unwrap() = err;
    }

    /// `(zone name, record name, record type)` for every successful delete, in order.
    pub fn deleted(&self) -> Vec<(String, String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn records_in(&self, zone_id: &str) -> Vec<RecordSet> {
        self.records
            .lock()
            .unwrap()
            .get(zone_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check_listing(&self) -> Result<(), CloudError> {
        match self.list_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ZoneCatalog for FakeDns {
    async fn list_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError> {
        self.check_listing()?;
        Ok(self
            .zones
            .lock()
            .unwrap()
            .iter()
            .filter(|z| z.resource_group == resource_group)
            .cloned()
            .collect())
    }

    async fn list_zones_global(&self) -> Result<Vec<Zone>, CloudError> {
        self.check_listing()?;
        Ok(self
            .zones
            .lock()
            .unwrap()
            .iter()
            .filter(|z| z.is_public())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecordStore for FakeDns {
    async fn list_record_sets(&self, zone: &Zone) -> Result<Vec<RecordSet>, CloudError> {
        self.records
            .lock()
            .unwrap()
            .get(&zone.id)
            .cloned()
            .ok_or_else(|| CloudError::api(404, Some("ResourceNotFound"), "zone not found"))
    }

    async fn delete_record_set(&self, zone: &Zone, record: &RecordSet) -> Result<(), CloudError> {
        let queued = self
            .delete_errors
            .lock()
            .unwrap()
            .get_mut(&(zone.id.clone(), record.name.clone()))
            .and_then(VecDeque::pop_front);
        if let Some(err) = queued {
            return Err(err);
        }

        let mut records = self.records.lock().unwrap();
        let set = records.get_mut(&zone.id).ok_or_else(|| {
            CloudError::api(404, Some("ResourceNotFound"), "zone not found")
        })?;
        let before = set.len();
        set.retain(|r| !(r.name == record.name && r.record_type == record.record_type));
        if set.len() == before {
            return Err(CloudError::api(404, Some("NotFound"), "record set not found"));
        }

        self.deleted.lock().unwrap().push((
            zone.name.clone(),
            record.name.clone(),
            record.record_type.clone(),
        ));
        Ok(())
    }
}

#[async_trait]
impl DnsBackend for FakeDns {
    async fn cluster_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError> {
        Ok(self
            .list_zones(resource_group)
            .await?
            .into_iter()
            .filter(|z| z.visibility == Visibility::Private)
            .collect())
    }

    async fn candidate_zones(&self) -> Result<Vec<Zone>, CloudError> {
        self.list_zones_global().await
    }
}

// ============================================================================
// Resource Groups
// ============================================================================

/// Resource group deleter replaying scripted results, then succeeding.
#[derive(Default)]
pub struct FakeResourceGroups {
    results: Mutex<VecDeque<Result<(), CloudError>>>,
    always: Mutex<Option<CloudError>>,
    calls: AtomicUsize,
}

impl FakeResourceGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, result: Result<(), CloudError>) -> Self {
        self.results.lock().unwrap().push_back(result);
        self
    }

    /// Fail every call with `err`.
    pub fn always_fail(self, err: CloudError) -> Self {
        *self.always.lock().unwrap() = Some(err);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceGroupDeleter for FakeResourceGroups {
    async fn delete(&self, _resource_group: &str) -> Result<(), CloudError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.always.lock().unwrap().clone() {
            return Err(err);
        }
        self.results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

// ============================================================================
// Directory
// ============================================================================

/// Identity directory holding service principals and applications in memory.
#[derive(Default)]
pub struct FakeDirectory {
    principals: Mutex<Vec<ServicePrincipal>>,
    applications: Mutex<Vec<Application>>,
    list_error: Mutex<Option<CloudError>>,
    delete_errors: Mutex<HashMap<String, CloudError>>,
    deleted: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service principal and, when `with_app`, its application object.
    pub fn with_principal(self, display_name: &str, app_id: &str, tags: &[&str], with_app: bool) -> Self {
        self.principals.lock().unwrap().push(ServicePrincipal {
            id: format!("sp-{app_id}"),
            app_id: app_id.to_string(),
            display_name: display_name.to_string(),
            tags: Some(tags.iter().map(|t| (*t).to_string()).collect()),
        });
        if with_app {
            self.applications.lock().unwrap().push(Application {
                id: format!("obj-{app_id}"),
                app_id: app_id.to_string(),
                display_name: Some(display_name.to_string()),
            });
        }
        self
    }

    /// Add an extra application object for `app_id`, making its filter ambiguous.
    pub fn with_duplicate_application(self, app_id: &str) -> Self {
        self.applications.lock().unwrap().push(Application {
            id: format!("dup-{app_id}"),
            app_id: app_id.to_string(),
            display_name: None,
        });
        self
    }

    pub fn fail_listing(self, err: CloudError) -> Self {
        *self.list_error.lock().unwrap() = Some(err);
        self
    }

    pub fn fail_delete(self, object_id: &str, err: CloudError) -> Self {
        self.delete_errors
            .lock()
            .unwrap()
            .insert(object_id.to_string(), err);
        self
    }

    /// Object IDs of deleted applications, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Number of service principal listings served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn service_principals(&self, display_name_prefix: &str) -> Result<Vec<ServicePrincipal>, CloudError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.list_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .principals
            .lock()
            .unwrap()
            .iter()
            .filter(|sp| sp.display_name.starts_with(display_name_prefix))
            .cloned()
            .collect())
    }

    async fn applications_by_app_id(&self, app_id: &str) -> Result<Vec<Application>, CloudError> {
        Ok(self
            .applications
            .lock()
            .unwrap()
            .iter()
            .filter(|app| app.app_id == app_id)
            .cloned()
            .collect())
    }

    async fn delete_application(&self, object_id: &str) -> Result<(), CloudError> {
        if let Some(err) = self.delete_errors.lock().unwrap().remove(object_id) {
            return Err(err);
        }

        let mut apps = self.applications.lock().unwrap();
        let before = apps.len();
        apps.retain(|app| app.id != object_id);
        if apps.len() == before {
            return Err(CloudError::api(404, Some("Request_ResourceNotFound"), "no such application"));
        }

        self.deleted.lock().unwrap().push(object_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Shared handles
// ============================================================================
//
// Tests hand an `Arc` to the orchestrator and keep a clone to inspect afterwards.

#[async_trait]
impl<T: ZoneCatalog + ?Sized> ZoneCatalog for Arc<T> {
    async fn list_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError> {
        (**self).list_zones(resource_group).await
    }

    async fn list_zones_global(&self) -> Result<Vec<Zone>, CloudError> {
        (**self).list_zones_global().await
    }
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn list_record_sets(&self, zone: &Zone) -> Result<Vec<RecordSet>, CloudError> {
        (**self).list_record_sets(zone).await
    }

    async fn delete_record_set(&self, zone: &Zone, record: &RecordSet) -> Result<(), CloudError> {
        (**self).delete_record_set(zone, record).await
    }
}

#[async_trait]
impl<T: DnsBackend + ?Sized> DnsBackend for Arc<T> {
    async fn cluster_zones(&self, resource_group: &str) -> Result<Vec<Zone>, CloudError> {
        (**self).cluster_zones(resource_group).await
    }

    async fn candidate_zones(&self) -> Result<Vec<Zone>, CloudError> {
        (**self).candidate_zones().await
    }
}

#[async_trait]
impl<T: ResourceGroupDeleter + ?Sized> ResourceGroupDeleter for Arc<T> {
    async fn delete(&self, resource_group: &str) -> Result<(), CloudError> {
        (**self).delete(resource_group).await
    }
}

#[async_trait]
impl<T: Directory + ?Sized> Directory for Arc<T> {
    async fn service_principals(&self, display_name_prefix: &str) -> Result<Vec<ServicePrincipal>, CloudError> {
        (**self).service_principals(display_name_prefix).await
    }

    async fn applications_by_app_id(&self, app_id: &str) -> Result<Vec<Application>, CloudError> {
        (**self).applications_by_app_id(app_id).await
    }

    async fn delete_application(&self, object_id: &str) -> Result<(), CloudError> {
        (**self).delete_application(object_id).await
    }
}
