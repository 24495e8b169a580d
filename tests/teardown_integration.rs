// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end teardown tests against mock Resource Manager and Graph servers.
//!
//! Run with: cargo test --test teardown_integration

use cluster_teardown::metadata::{ClusterMetadata, TeardownJob};
use cluster_teardown::orchestrator::{JobState, Orchestrator, Phase, PhaseError, TeardownConfig};
use cluster_teardown::session::{parse_endpoint, Session};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Fixtures
// ============================================================================

const SUB: &str = "sub-1";
const CLUSTER_RG: &str = "/subscriptions/sub-1/resourceGroups/demo-1-rg/providers";
const PRIVATE_ZONE_ID: &str = "/subscriptions/sub-1/resourceGroups/demo-1-rg/providers/Microsoft.Network/privateDnsZones/demo-1.example.com";
const PUBLIC_ZONE_ID: &str =
    "/subscriptions/sub-1/resourceGroups/shared-dns/providers/Microsoft.Network/dnszones/example.com";
const OWNED_TAG: &str = "kubernetes.io_cluster.demo-1=owned";

const METADATA: &str = r#"{
    "clusterName": "demo",
    "infraID": "demo-1",
    "azure": {
        "cloudName": "AzurePublicCloud",
        "region": "eastus",
        "resourceGroupName": "",
        "baseDomainResourceGroupName": "shared-dns"
    }
}"#;

struct Cloud {
    arm: MockServer,
    graph: MockServer,
}

impl Cloud {
    async fn start() -> Self {
        Self {
            arm: MockServer::start().await,
            graph: MockServer::start().await,
        }
    }

    fn orchestrator(&self) -> Orchestrator {
        let metadata = ClusterMetadata::from_json(METADATA).unwrap();
        let config = TeardownConfig::default();
        let job = TeardownJob::from_metadata(&metadata, config.budget).unwrap();
        let session = Session::new(
            SUB,
            "tenant-1",
            parse_endpoint(&self.arm.uri()).unwrap(),
            parse_endpoint(&self.graph.uri()).unwrap(),
            "arm-token",
            "graph-token",
        );
        Orchestrator::for_azure(job, config, &session).unwrap()
    }
}

fn ok_json(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn arm_error(status: u16, code: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"code": code, "message": format!("{code} from mock")}
    }))
}

async fn mount_get(server: &MockServer, get_path: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(get_path))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Zones and records of the demo-1 cluster, including one record leaked into example.com.
async fn mount_demo_dns(arm: &MockServer) {
    mount_get(
        arm,
        &format!("{CLUSTER_RG}/Microsoft.Network/dnszones"),
        ok_json(json!({"value": []})),
    )
    .await;
    mount_get(
        arm,
        &format!("{CLUSTER_RG}/Microsoft.Network/privateDnsZones"),
        ok_json(json!({"value": [{"id": PRIVATE_ZONE_ID, "name": "demo-1.example.com"}]})),
    )
    .await;
    mount_get(
        arm,
        "/subscriptions/sub-1/providers/Microsoft.Network/dnszones",
        ok_json(json!({"value": [{
            "id": PUBLIC_ZONE_ID,
            "name": "example.com",
            "properties": {"zoneType": "Public"}
        }]})),
    )
    .await;
    mount_get(
        arm,
        &format!("{PRIVATE_ZONE_ID}/ALL"),
        ok_json(json!({"value": [
            {"name": "@", "type": "Microsoft.Network/privateDnsZones/SOA"},
            {"name": "api", "type": "Microsoft.Network/privateDnsZones/A"},
            {"name": "api-int", "type": "Microsoft.Network/privateDnsZones/A"}
        ]})),
    )
    .await;
    mount_get(
        arm,
        &format!("{PUBLIC_ZONE_ID}/recordsets"),
        ok_json(json!({"value": [
            {"name": "@", "type": "Microsoft.Network/dnszones/SOA"},
            {"name": "@", "type": "Microsoft.Network/dnszones/NS"},
            {"name": "api.demo-1", "type": "Microsoft.Network/dnszones/A"},
            {"name": "other", "type": "Microsoft.Network/dnszones/A"}
        ]})),
    )
    .await;
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_demo_cluster_end_to_end() {
    let cloud = Cloud::start().await;
    mount_demo_dns(&cloud.arm).await;

    Mock::given(method("DELETE"))
        .and(path(format!("{PUBLIC_ZONE_ID}/A/api.demo-1")))
        .and(query_param("api-version", "2018-05-01"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&cloud.arm)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("{PUBLIC_ZONE_ID}/A/other")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&cloud.arm)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/subscriptions/sub-1/resourcegroups/demo-1-rg"))
        .and(query_param("api-version", "2021-04-01"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header(
                    "Location",
                    format!("{}/operations/delete-demo-1-rg", cloud.arm.uri()).as_str(),
                )
                .insert_header("Retry-After", "0"),
        )
        .expect(1)
        .mount(&cloud.arm)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/delete-demo-1-rg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&cloud.arm)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/servicePrincipals"))
        .and(query_param("$filter", "startswith(displayName,'demo-1')"))
        .respond_with(ok_json(json!({"value": [
            {"id": "sp-1", "appId": "app-1", "displayName": "demo-1-identity", "tags": [OWNED_TAG]}
        ]})))
        .expect(1)
        .mount(&cloud.graph)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1.0/applications"))
        .and(query_param("$filter", "appId eq 'app-1'"))
        .respond_with(ok_json(json!({"value": [
            {"id": "obj-1", "appId": "app-1", "displayName": "demo-1-identity"}
        ]})))
        .expect(1)
        .mount(&cloud.graph)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/v1.0/applications/obj-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&cloud.graph)
        .await;

    let mut orchestrator = cloud.orchestrator();
    let errors = orchestrator.run().await;

    assert!(errors.is_empty(), "{errors}");
    assert_eq!(orchestrator.state(), JobState::Succeeded);
}

#[tokio::test]
async fn test_already_torn_down_twice() {
    let cloud = Cloud::start().await;

    // Cluster resource group is gone, so every listing under it is a 404
    Mock::given(method("GET"))
        .and(path(format!("{CLUSTER_RG}/Microsoft.Network/dnszones")))
        .respond_with(arm_error(404, "ResourceGroupNotFound"))
        .mount(&cloud.arm)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{CLUSTER_RG}/Microsoft.Network/privateDnsZones")))
        .respond_with(arm_error(404, "ResourceGroupNotFound"))
        .mount(&cloud.arm)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/subscriptions/sub-1/resourcegroups/demo-1-rg"))
        .respond_with(arm_error(404, "ResourceGroupNotFound"))
        .expect(2)
        .mount(&cloud.arm)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/servicePrincipals"))
        .respond_with(ok_json(json!({"value": null})))
        .expect(2)
        .mount(&cloud.graph)
        .await;

    for _ in 0..2 {
        let mut orchestrator = cloud.orchestrator();
        let errors = orchestrator.run().await;
        assert!(errors.is_empty(), "{errors}");
        assert_eq!(orchestrator.state(), JobState::Succeeded);
    }
}

#[tokio::test]
async fn test_expired_credentials_abort_the_job() {
    let cloud = Cloud::start().await;

    Mock::given(method("GET"))
        .respond_with(arm_error(401, "ExpiredAuthenticationToken"))
        .mount(&cloud.arm)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&cloud.arm)
        .await;
    Mock::given(method("GET"))
        .respond_with(ok_json(json!({"value": []})))
        .expect(0)
        .mount(&cloud.graph)
        .await;

    let mut orchestrator = cloud.orchestrator();
    let errors = orchestrator.run().await;

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors.errors()[0],
        PhaseError::Failed {
            phase: Phase::Dns,
            ..
        }
    ));
    assert_eq!(orchestrator.state(), JobState::Aborted);
    assert!(errors.to_string().contains("ExpiredAuthenticationToken"));
}
