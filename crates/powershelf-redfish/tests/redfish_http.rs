use std::time::Duration;

use powershelf_errors::{Classify, ErrorCategory};
use powershelf_redfish::{
    HttpPmcConnector, PmcClient, PmcConnector, PowerState, RedfishClient, RedfishError, ResetType,
};
use powershelf_types::{Credential, MacAddr, Pmc, PmcAccess, Vendor};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_bytes, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn client(server: &MockServer) -> Result<RedfishClient, RedfishError> {
    RedfishClient::new(
        server.uri(),
        Credential::new("root", "0penBmc"),
        Duration::from_secs(5),
    )
}

async fn mount_managers(server: &MockServer, firmware: &str) {
    Mock::given(method("GET"))
        .and(path("/redfish/v1/Managers"))
        .and(basic_auth("root", "0penBmc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Members": [
                { "@odata.id": "/redfish/v1/Managers/hmc" },
                { "@odata.id": "/redfish/v1/Managers/bmc" }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/redfish/v1/Managers/hmc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Id": "hmc", "FirmwareVersion": "9.9.9" })),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/redfish/v1/Managers/bmc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Id": "bmc", "FirmwareVersion": firmware })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn firmware_version_comes_from_bmc_manager() -> TestResult {
    let server = MockServer::start().await;
    mount_managers(&server, "r1.2.0").await;

    assert_eq!(client(&server)?.firmware_version().await?, "r1.2.0");
    Ok(())
}

#[tokio::test]
async fn chassis_lookup_by_id() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redfish/v1/Chassis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Members": [{ "@odata.id": "/redfish/v1/Chassis/powershelf" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/redfish/v1/Chassis/powershelf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "powershelf", "PowerState": "On", "SerialNumber": "PS-001"
        })))
        .mount(&server)
        .await;

    let chassis = client(&server)?.query_chassis().await?;
    assert_eq!(chassis.power_state, Some(PowerState::On));
    assert_eq!(chassis.serial_number.as_deref(), Some("PS-001"));
    Ok(())
}

const PSUS: &str = "/redfish/v1/Chassis/powershelf/PowerSubsystem/PowerSupplies";

async fn mount_power_supplies(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(PSUS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Members": [
                { "@odata.id": format!("{PSUS}/PSU0") },
                { "@odata.id": format!("{PSUS}/PSU1") }
            ]
        })))
        .mount(server)
        .await;
    for (id, firmware) in [("PSU0", "1.0.4"), ("PSU1", "1.0.5")] {
        Mock::given(method("GET"))
            .and(path(format!("{PSUS}/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "@odata.id": format!("{PSUS}/{id}"),
                "Id": id,
                "Name": id,
                "FirmwareVersion": firmware,
                "PowerCapacityWatts": 5500,
                "Status": { "State": "Enabled", "Health": "OK" }
            })))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn power_supplies_carry_their_sensors() -> TestResult {
    let server = MockServer::start().await;
    mount_power_supplies(&server).await;
    Mock::given(method("GET"))
        .and(path("/redfish/v1/Chassis/powershelf/Sensors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Members": [{ "@odata.id": "/redfish/v1/Chassis/powershelf/Sensors/PSU1_Pout" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/redfish/v1/Chassis/powershelf/Sensors/PSU1_Pout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "PSU1_Pout",
            "Reading": 1830.0,
            "ReadingUnits": "W",
            "RelatedItem": [{ "@odata.id": format!("{PSUS}/PSU1") }]
        })))
        .mount(&server)
        .await;

    let supplies = client(&server)?.query_power_supplies().await?;
    let summary: Vec<(&str, Option<&str>, usize)> = supplies
        .iter()
        .map(|psu| (psu.id.as_str(), psu.firmware_version.as_deref(), psu.sensors.len()))
        .collect();
    assert_eq!(summary, [("PSU0", Some("1.0.4"), 0), ("PSU1", Some("1.0.5"), 1)]);
    Ok(())
}

#[tokio::test]
async fn missing_sensor_collection_is_not_an_error() -> TestResult {
    let server = MockServer::start().await;
    mount_power_supplies(&server).await;

    let supplies = client(&server)?.query_power_supplies().await?;
    assert_eq!(supplies.len(), 2);
    assert!(supplies.iter().all(|psu| psu.sensors.is_empty()));
    Ok(())
}

#[tokio::test]
async fn missing_manager_is_device_error() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redfish/v1/Managers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Members": [] })))
        .mount(&server)
        .await;

    let err = client(&server)?.query_manager().await.err().ok_or("expected error")?;
    assert!(matches!(err, RedfishError::MissingResource(_)));
    assert_eq!(err.category(), ErrorCategory::Device);
    Ok(())
}

#[tokio::test]
async fn update_firmware_patches_apply_time_then_pushes_image() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/redfish/v1/UpdateService"))
        .and(body_json(json!({
            "HttpPushUriOptions": { "HttpPushUriApplyTime": { "ApplyTime": "Immediate" } }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/redfish/v1/UpdateService"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(b"FWIMAGE".to_vec()))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)?.update_firmware(b"FWIMAGE".to_vec()).await?;
    Ok(())
}

#[tokio::test]
async fn power_and_reset_actions_post_expected_bodies() -> TestResult {
    let server = MockServer::start().await;
    for (uri, body) in [
        ("/redfish/v1/Chassis/powershelf/Actions/Chassis.On", json!({ "OnType": "On" })),
        (
            "/redfish/v1/Chassis/powershelf/Actions/Chassis.ForceOff",
            json!({ "ForceOffType": "ForceOff" }),
        ),
        (
            "/redfish/v1/Managers/bmc/Actions/Manager.Reset",
            json!({ "ResetType": "GracefulRestart" }),
        ),
    ] {
        Mock::given(method("POST"))
            .and(path(uri))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    let pmc = client(&server)?;
    pmc.power_on().await?;
    pmc.power_off().await?;
    pmc.reset_pmc(ResetType::GracefulRestart).await?;
    Ok(())
}

#[tokio::test]
async fn error_status_carries_body() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/redfish/v1/Chassis/powershelf/Actions/Chassis.On"))
        .respond_with(ResponseTemplate::new(409).set_body_string("busy"))
        .mount(&server)
        .await;

    match client(&server)?.power_on().await {
        Err(RedfishError::Status { status, body, .. }) => {
            assert_eq!(status, 409);
            assert_eq!(body, "busy");
        }
        other => return Err(format!("unexpected result: {other:?}").into()),
    }
    Ok(())
}

#[tokio::test]
async fn connector_checks_service_root() -> TestResult {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/redfish/v1"))
        .and(basic_auth("root", "0penBmc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "RedfishVersion": "1.9.0" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_managers(&server, "1.3.0").await;

    let access = PmcAccess::new(
        Pmc::new(
            MacAddr::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]),
            "10.0.0.7".parse()?,
            Vendor::Liteon,
        ),
        Credential::new("root", "0penBmc"),
    );
    let connector =
        HttpPmcConnector::new(Duration::from_secs(5)).with_endpoint_override(server.uri());
    let pmc = connector.connect(&access).await?;
    assert_eq!(pmc.firmware_version().await?, "1.3.0");
    Ok(())
}
