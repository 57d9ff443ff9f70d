use anyhow::Result;
use serde_json::json;
use std::time::Duration;
use tierscout::auth::AccessToken;
use tierscout::core::{DefenderApi, Scanner};
use tierscout::http::ArmClient;
use tierscout::plan::PlanLabel;
use tierscout::resource::{Coverage, ResourceScope};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUB: &str = "00000000-0000-0000-0000-000000000001";

fn client(server: &MockServer) -> Result<ArmClient> {
    ArmClient::new(
        &server.uri(),
        AccessToken::new("test-token"),
        Duration::from_secs(5),
    )
}

fn vm_id(name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/{}",
        SUB, name
    )
}

fn vm_item(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "id": vm_id(name),
        "type": "Microsoft.Compute/virtualMachines",
        "location": "westeurope"
    })
}

async fn mount_empty_listing(server: &MockServer, resource_type: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{}/providers/{}", SUB, resource_type)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_http_client_creation() -> Result<()> {
    let client = ArmClient::new(
        "https://management.azure.com/",
        AccessToken::new("token"),
        Duration::from_millis(500),
    )?;

    assert_eq!(client.endpoint(), "https://management.azure.com");
    Ok(())
}

#[tokio::test]
async fn test_bind_subscription_sends_bearer_token() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{}", SUB)))
        .and(query_param("api-version", "2022-12-01"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscriptionId": SUB,
            "displayName": "Production",
            "state": "Enabled"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = client(&server)?.bind_subscription(SUB).await?;

    assert_eq!(info.subscription_id, SUB);
    assert_eq!(info.display_name.as_deref(), Some("Production"));
    assert_eq!(info.state.as_deref(), Some("Enabled"));
    Ok(())
}

#[tokio::test]
async fn test_arm_error_body_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{}", SUB)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": "SubscriptionNotFound",
                "message": "The subscription could not be found."
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)?.bind_subscription(SUB).await.unwrap_err();
    let message = format!("{:#}", err);

    assert!(message.contains("is not accessible"));
    assert!(message.contains("404"));
    assert!(message.contains("SubscriptionNotFound"));
    assert!(message.contains("could not be found"));
    Ok(())
}

#[tokio::test]
async fn test_non_json_error_reports_status() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client(&server)?
        .resource_pricing(&vm_id("vm1"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("502"));
    Ok(())
}

#[tokio::test]
async fn test_subscription_and_resource_pricing() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.Security/pricings/VirtualMachines",
            SUB
        )))
        .and(query_param("api-version", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "VirtualMachines",
            "properties": { "pricingTier": "Standard", "subPlan": "P2", "enforce": "True" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "{}/providers/Microsoft.Security/pricings/virtualMachines",
            vm_id("vm1")
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {
                "pricingTier": "Free",
                "inherited": "False"
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server)?;

    let default = client.subscription_pricing(SUB).await?;
    assert_eq!(default.label(), PlanLabel::P2);
    assert_eq!(default.enforce.as_deref(), Some("True"));

    let resource = client.resource_pricing(&vm_id("vm1")).await?;
    assert_eq!(resource.label(), PlanLabel::Free);
    assert_eq!(resource.inherited.as_deref(), Some("False"));
    Ok(())
}

#[tokio::test]
async fn test_listing_follows_next_link() -> Result<()> {
    let server = MockServer::start().await;
    let next_link = format!(
        "{}/subscriptions/{}/providers/Microsoft.Compute/virtualMachines/page2?api-version=2024-03-01",
        server.uri(),
        SUB
    );

    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.Compute/virtualMachines",
            SUB
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [vm_item("vm1"), vm_item("vm2")],
            "nextLink": next_link
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.Compute/virtualMachines/page2",
            SUB
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [vm_item("vm3")]
        })))
        .mount(&server)
        .await;

    let resources = client(&server)?.list_resources(SUB, Coverage::Vm).await?;

    let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["vm1", "vm2", "vm3"]);
    assert_eq!(resources[0].resource_id, vm_id("vm1"));
    Ok(())
}

#[tokio::test]
async fn test_compute_coverage_lists_all_kinds_in_order() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.Compute/virtualMachines",
            SUB
        )))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": [vm_item("vm1")] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.Compute/virtualMachineScaleSets",
            SUB
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "name": "scale1",
                "id": format!("/subscriptions/{}/resourceGroups/rg/providers/Microsoft.Compute/virtualMachineScaleSets/scale1", SUB),
                "type": "Microsoft.Compute/virtualMachineScaleSets"
            }]
        })))
        .mount(&server)
        .await;
    // Arc provider not registered in this subscription
    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.HybridCompute/machines",
            SUB
        )))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "code": "MissingSubscriptionRegistration",
                "message": "The subscription is not registered to use namespace 'Microsoft.HybridCompute'."
            }
        })))
        .mount(&server)
        .await;

    let resources = client(&server)?
        .list_resources(SUB, Coverage::Compute)
        .await?;

    let scopes: Vec<ResourceScope> = resources.iter().map(|r| r.scope()).collect();
    assert_eq!(scopes, vec![ResourceScope::Vm, ResourceScope::Vmss]);
    Ok(())
}

#[tokio::test]
async fn test_listing_fails_when_every_kind_fails() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "AuthorizationFailed", "message": "denied" }
        })))
        .mount(&server)
        .await;

    let err = client(&server)?
        .list_resources(SUB, Coverage::Compute)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("AuthorizationFailed"));
    Ok(())
}

#[tokio::test]
async fn test_scanner_against_arm_endpoint() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{}", SUB)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscriptionId": SUB,
            "displayName": "Production",
            "state": "Enabled"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.Security/pricings/VirtualMachines",
            SUB
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": { "pricingTier": "Standard", "subPlan": "P2" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.Compute/virtualMachines",
            SUB
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [vm_item("vm1"), vm_item("vm2"), vm_item("vm3")]
        })))
        .mount(&server)
        .await;
    mount_empty_listing(&server, "Microsoft.Compute/virtualMachineScaleSets").await;
    mount_empty_listing(&server, "Microsoft.HybridCompute/machines").await;

    Mock::given(method("GET"))
        .and(path(format!(
            "{}/providers/Microsoft.Security/pricings/virtualMachines",
            vm_id("vm1")
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": { "pricingTier": "Standard", "subPlan": "P1" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "{}/providers/Microsoft.Security/pricings/virtualMachines",
            vm_id("vm2")
        )))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "AuthorizationFailed", "message": "denied" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    // Beyond the limit, never requested
    Mock::given(method("GET"))
        .and(path(format!(
            "{}/providers/Microsoft.Security/pricings/virtualMachines",
            vm_id("vm3")
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": { "pricingTier": "Free" }
        })))
        .expect(0)
        .mount(&server)
        .await;

    let scanner = Scanner::new(client(&server)?, Coverage::Compute);
    let outcome = scanner.scan(&[SUB.to_string()], Some(2)).await;

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].plan, PlanLabel::P1);
    assert_eq!(outcome.records[1].plan, PlanLabel::Error);
    assert!(outcome.records[1]
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("AuthorizationFailed")));
    assert_eq!(outcome.subscription_defaults.get(SUB), Some(&PlanLabel::P2));
    assert_eq!(outcome.overrides().len(), 1);
    Ok(())
}
