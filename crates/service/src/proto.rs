//! Generated `powershelf.v1` types and their mapping to domain types

use chrono::{DateTime, Utc};
use powershelf_errors::{Classify, ErrorCategory};
use powershelf_firmware::{FirmwareState, FirmwareUpdate, PowerShelf as ShelfSnapshot};
use powershelf_redfish::model;
use powershelf_types::{Component, Vendor};

mod generated {
    tonic::include_proto!("powershelf.v1");
}

pub use generated::*;

impl From<PowershelfComponent> for Component {
    fn from(component: PowershelfComponent) -> Self {
        match component {
            PowershelfComponent::Pmc => Component::Pmc,
            PowershelfComponent::Psu => Component::Psu,
        }
    }
}

impl From<Component> for PowershelfComponent {
    fn from(component: Component) -> Self {
        match component {
            Component::Pmc => PowershelfComponent::Pmc,
            Component::Psu => PowershelfComponent::Psu,
        }
    }
}

impl From<PmcVendor> for Vendor {
    fn from(vendor: PmcVendor) -> Self {
        match vendor {
            PmcVendor::Liteon => Vendor::Liteon,
            PmcVendor::Unsupported => Vendor::Unsupported,
        }
    }
}

impl From<Vendor> for PmcVendor {
    fn from(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Liteon => PmcVendor::Liteon,
            Vendor::Unsupported => PmcVendor::Unsupported,
        }
    }
}

impl From<FirmwareState> for FirmwareUpdateState {
    fn from(state: FirmwareState) -> Self {
        match state {
            FirmwareState::Queued => FirmwareUpdateState::Queued,
            FirmwareState::Verifying => FirmwareUpdateState::Verifying,
            FirmwareState::Completed => FirmwareUpdateState::Completed,
            FirmwareState::Failed => FirmwareUpdateState::Failed,
        }
    }
}

impl From<ErrorCategory> for StatusCode {
    fn from(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Input => StatusCode::InvalidArgument,
            ErrorCategory::NotFound => StatusCode::NotFound,
            ErrorCategory::Conflict => StatusCode::Conflict,
            ErrorCategory::Device => StatusCode::Unavailable,
            _ => StatusCode::InternalError,
        }
    }
}

/// Wire timestamp for `at`.
pub fn timestamp(at: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: at.timestamp(),
        nanos: i32::try_from(at.timestamp_subsec_nanos()).unwrap_or(0),
    }
}

/// Decode an enum field, rejecting values this build does not know.
///
/// # Errors
///
/// [`tonic::Status::invalid_argument`] naming `field`.
pub fn enum_field<E: TryFrom<i32>>(field: &str, raw: i32) -> Result<E, tonic::Status> {
    E::try_from(raw)
        .map_err(|_unknown| tonic::Status::invalid_argument(format!("unknown {field} value {raw}")))
}

/// Map a domain error onto a gRPC status by its category.
pub fn to_status<E: Classify + std::fmt::Display>(err: &E) -> tonic::Status {
    let message = err.to_string();
    match err.category() {
        ErrorCategory::Input => tonic::Status::invalid_argument(message),
        ErrorCategory::NotFound => tonic::Status::not_found(message),
        ErrorCategory::Conflict => tonic::Status::failed_precondition(message),
        ErrorCategory::Device => tonic::Status::unavailable(message),
        _ => tonic::Status::internal(message),
    }
}

/// Status entry for a found record.
pub fn update_status(mac: &str, update: &FirmwareUpdate) -> FirmwareUpdateStatus {
    FirmwareUpdateStatus {
        pmc_mac_address: mac.to_string(),
        component: PowershelfComponent::from(update.component).into(),
        state: FirmwareUpdateState::from(update.state).into(),
        version_from: update.version_from.to_string(),
        version_to: update.version_to.to_string(),
        error_message: update.error_message.clone().unwrap_or_default(),
        last_transition_time: Some(timestamp(update.last_transition_time)),
        updated_at: Some(timestamp(update.updated_at)),
        status: StatusCode::Success.into(),
        error: String::new(),
    }
}

fn threshold(t: Option<model::Threshold>) -> Option<SensorThreshold> {
    t.map(|t| SensorThreshold {
        reading: t.reading.unwrap_or_default(),
    })
}

fn sensor(sensor: &model::Sensor) -> Sensor {
    Sensor {
        id: sensor.id.clone(),
        name: sensor.name.clone(),
        reading: sensor.reading.unwrap_or_default(),
        reading_range_max: sensor.reading_range_max.unwrap_or_default(),
        reading_range_min: sensor.reading_range_min.unwrap_or_default(),
        reading_type: sensor.reading_type.clone().unwrap_or_default(),
        reading_units: sensor.reading_units.clone().unwrap_or_default(),
        thresholds: sensor.thresholds.map(|t| SensorThresholds {
            lower_caution: threshold(t.lower_caution),
            lower_critical: threshold(t.lower_critical),
            upper_caution: threshold(t.upper_caution),
            upper_critical: threshold(t.upper_critical),
        }),
    }
}

fn power_supply(psu: &model::PowerSupply) -> PowerSupplyUnit {
    let status = psu.status.clone().unwrap_or_default();
    PowerSupplyUnit {
        id: psu.id.clone(),
        name: psu.name.clone(),
        capacity_watts: psu.power_capacity_watts.unwrap_or_default(),
        firmware_version: psu.firmware_version.clone().unwrap_or_default(),
        manufacturer: psu.manufacturer.clone().unwrap_or_default(),
        model: psu.model.clone().unwrap_or_default(),
        serial_number: psu.serial_number.clone().unwrap_or_default(),
        part_number: psu.part_number.clone().unwrap_or_default(),
        hot_pluggable: psu.hot_pluggable.unwrap_or_default(),
        service_label: psu.service_label().unwrap_or_default().to_string(),
        state: status.state.unwrap_or_default(),
        health: status.health.unwrap_or_default(),
        sensors: psu.sensors.iter().map(sensor).collect(),
    }
}

/// Wire form of an inventory snapshot. PMC hardware fields come from the
/// manager resource and stay empty until the shelf has answered.
pub fn powershelf(shelf: &ShelfSnapshot) -> PowerShelf {
    let mut pmc = PowerManagementController {
        mac_address: shelf.pmc.mac.to_string(),
        ip_address: shelf.pmc.ip.to_string(),
        vendor: PmcVendor::from(shelf.pmc.vendor).into(),
        ..PowerManagementController::default()
    };
    if let Some(manager) = &shelf.manager {
        pmc.serial_number = manager.serial_number.clone().unwrap_or_default();
        pmc.model = manager.model.clone().unwrap_or_default();
        pmc.manufacturer = manager.manufacturer.clone().unwrap_or_default();
        pmc.part_number = manager.part_number.clone().unwrap_or_default();
        pmc.firmware_version = manager.firmware_version.clone();
    }
    PowerShelf {
        pmc: Some(pmc),
        chassis: shelf.chassis.as_ref().map(|c| Chassis {
            serial_number: c.serial_number.clone().unwrap_or_default(),
            model: c.model.clone().unwrap_or_default(),
            manufacturer: c.manufacturer.clone().unwrap_or_default(),
            part_number: c.part_number.clone().unwrap_or_default(),
            power_state: c.power_state.map(|p| p.to_string()).unwrap_or_default(),
        }),
        psus: shelf.power_supplies.iter().map(power_supply).collect(),
        collected_at: shelf.collected_at.map(timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powershelf_firmware::FirmwareError;
    use powershelf_types::MacAddr;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_categories_map_to_grpc_codes() {
        let mac = MacAddr::new([0, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let not_found = to_status(&FirmwareError::NoUpdateRecord {
            pmc: mac,
            component: Component::Pmc,
        });
        assert_eq!(not_found.code(), tonic::Code::NotFound);

        let conflict = to_status(&FirmwareError::InFlight {
            pmc: mac,
            component: Component::Pmc,
        });
        assert_eq!(conflict.code(), tonic::Code::FailedPrecondition);

        let device = to_status(&FirmwareError::DeviceTimeout(std::time::Duration::from_secs(30)));
        assert_eq!(device.code(), tonic::Code::Unavailable);
    }

    #[test]
    fn test_batch_status_codes() {
        assert_eq!(StatusCode::from(ErrorCategory::Input), StatusCode::InvalidArgument);
        assert_eq!(StatusCode::from(ErrorCategory::Device), StatusCode::Unavailable);
        assert_eq!(StatusCode::from(ErrorCategory::Store), StatusCode::InternalError);
    }

    #[test]
    fn test_unknown_enum_value_is_invalid_argument() {
        let result = enum_field::<PowershelfComponent>("component", 7);
        assert!(matches!(result, Err(s) if s.code() == tonic::Code::InvalidArgument));
        assert!(matches!(
            enum_field::<PowershelfComponent>("component", 1),
            Ok(PowershelfComponent::Psu)
        ));
    }

    #[test]
    fn test_registration_only_shelf_has_no_hardware_fields() -> TestResult {
        let pmc = powershelf_types::Pmc::new(
            "00:11:22:33:44:55".parse()?,
            "10.0.0.5".parse()?,
            Vendor::Liteon,
        );
        let wire = powershelf(&ShelfSnapshot::registered(pmc));

        let controller = wire.pmc.ok_or("pmc missing")?;
        assert_eq!(controller.mac_address, "00:11:22:33:44:55");
        assert_eq!(controller.vendor, i32::from(PmcVendor::Liteon));
        assert!(controller.firmware_version.is_empty());
        assert_eq!(wire.chassis, None);
        assert!(wire.psus.is_empty());
        assert_eq!(wire.collected_at, None);
        Ok(())
    }

    #[test]
    fn test_timestamp_keeps_subsecond_precision() {
        let at = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap_or_default();
        let ts = timestamp(at);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 250_000_000);
    }
}
