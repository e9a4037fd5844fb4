//! Redfish resources, reduced to the fields the manager reads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `@odata.id` link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ODataId {
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
}

/// Resource collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    #[serde(rename = "Members", default)]
    pub members: Vec<ODataId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    On,
    Off,
    PoweringOn,
    PoweringOff,
    Paused,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::On => "On",
            PowerState::Off => "Off",
            PowerState::PoweringOn => "PoweringOn",
            PowerState::PoweringOff => "PoweringOff",
            PowerState::Paused => "Paused",
            PowerState::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// `Manager.Reset` flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetType {
    GracefulRestart,
    ForceRestart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manager {
    pub id: String,
    #[serde(default)]
    pub firmware_version: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Chassis {
    pub id: String,
    #[serde(default)]
    pub power_state: Option<PowerState>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
}

/// `Status` block carried by most resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub health: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartLocation {
    #[serde(default)]
    pub service_label: Option<String>,
    #[serde(default)]
    pub location_ordinal_value: Option<u32>,
    #[serde(default)]
    pub location_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    #[serde(default)]
    pub part_location: Option<PartLocation>,
}

/// One threshold of a [`Sensor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Threshold {
    #[serde(default)]
    pub reading: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Thresholds {
    #[serde(default)]
    pub lower_caution: Option<Threshold>,
    #[serde(default)]
    pub lower_critical: Option<Threshold>,
    #[serde(default)]
    pub upper_caution: Option<Threshold>,
    #[serde(default)]
    pub upper_critical: Option<Threshold>,
}

/// A chassis sensor. `RelatedItem` names the resources it measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Sensor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reading: Option<f64>,
    #[serde(default)]
    pub reading_range_max: Option<f64>,
    #[serde(default)]
    pub reading_range_min: Option<f64>,
    #[serde(default)]
    pub reading_type: Option<String>,
    #[serde(default)]
    pub reading_units: Option<String>,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
    #[serde(default)]
    pub related_item: Vec<ODataId>,
}

impl Sensor {
    /// Whether the sensor lists `odata_id` among its related items.
    pub fn measures(&self, odata_id: &str) -> bool {
        self.related_item.iter().any(|item| item.odata_id == odata_id)
    }
}

/// A power supply unit under the shelf's `PowerSubsystem`.
///
/// `sensors` is not part of the resource; clients fill it from the chassis
/// sensor collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerSupply {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub power_capacity_watts: Option<f64>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub hot_pluggable: Option<bool>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(skip_deserializing, default)]
    pub sensors: Vec<Sensor>,
}

impl PowerSupply {
    /// Slot label, when the service reports one.
    pub fn service_label(&self) -> Option<&str> {
        self.location
            .as_ref()
            .and_then(|l| l.part_location.as_ref())
            .and_then(|p| p.service_label.as_deref())
    }
}

/// Hand each sensor to the supply it measures. Sensors that name no
/// supply are dropped.
pub fn attach_sensors(supplies: &mut [PowerSupply], sensors: Vec<Sensor>) {
    for sensor in sensors {
        if let Some(supply) = supplies.iter_mut().find(|s| sensor.measures(&s.odata_id)) {
            supply.sensors.push(sensor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_decodes_from_service_payload() -> Result<(), serde_json::Error> {
        let manager: Manager = serde_json::from_str(
            r#"{
                "@odata.id": "/redfish/v1/Managers/bmc",
                "Id": "bmc",
                "FirmwareVersion": "r1.3.7",
                "Manufacturer": "LITEON",
                "Status": {"State": "Enabled"}
            }"#,
        )?;
        assert_eq!(manager.id, "bmc");
        assert_eq!(manager.firmware_version, "r1.3.7");
        assert_eq!(manager.model, None);
        Ok(())
    }

    #[test]
    fn unknown_power_state_is_tolerated() -> Result<(), serde_json::Error> {
        let chassis: Chassis =
            serde_json::from_str(r#"{"Id": "powershelf", "PowerState": "Standby"}"#)?;
        assert_eq!(chassis.power_state, Some(PowerState::Unknown));
        Ok(())
    }

    #[test]
    fn sensors_follow_related_item() -> Result<(), Box<dyn std::error::Error>> {
        let mut supplies: Vec<PowerSupply> = serde_json::from_str(
            r#"[
                {"@odata.id": "/redfish/v1/Chassis/powershelf/PowerSubsystem/PowerSupplies/PSU0",
                 "Id": "PSU0",
                 "Location": {"PartLocation": {"ServiceLabel": "PSU 0", "LocationType": "Bay"}}},
                {"@odata.id": "/redfish/v1/Chassis/powershelf/PowerSubsystem/PowerSupplies/PSU1",
                 "Id": "PSU1"}
            ]"#,
        )?;
        let sensors: Vec<Sensor> = serde_json::from_str(
            r#"[
                {"Id": "PSU1_Vin", "Reading": 208.5, "ReadingUnits": "V",
                 "Thresholds": {"UpperCritical": {"Reading": 264.0}},
                 "RelatedItem": [
                   {"@odata.id": "/redfish/v1/Chassis/powershelf/PowerSubsystem/PowerSupplies/PSU1"}
                 ]},
                {"Id": "Inlet_Temp", "Reading": 24.0,
                 "RelatedItem": [{"@odata.id": "/redfish/v1/Chassis/powershelf"}]}
            ]"#,
        )?;

        attach_sensors(&mut supplies, sensors);
        let [psu0, psu1] = supplies.as_slice() else {
            return Err("expected two supplies".into());
        };
        assert!(psu0.sensors.is_empty());
        assert_eq!(psu0.service_label(), Some("PSU 0"));
        assert_eq!(psu1.sensors.len(), 1);
        let vin = psu1.sensors.first().and_then(|s| s.thresholds);
        assert_eq!(vin.and_then(|t| t.upper_critical).and_then(|t| t.reading), Some(264.0));
        Ok(())
    }
}
