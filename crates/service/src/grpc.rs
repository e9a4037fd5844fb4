//! gRPC front end for `powershelf.v1.PowershelfManager`
//!
//! Batch RPCs never fail as a whole: each item carries its own
//! [`StatusCode`] and message. Single-item RPCs return a [`Status`] mapped
//! from the error category.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use powershelf_errors::{Classify, ValidationError};
use powershelf_types::{Credential, MacAddr, Pmc, PmcAccess, Vendor};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::manager::PowershelfManager;
use crate::proto::{
    self, AvailableFirmware, CanUpdateFirmwareRequest, CanUpdateFirmwareResponse,
    ComponentFirmwareUpgrades, FirmwareUpdateQuery, FirmwareUpdateStatus,
    GetFirmwareSummaryRequest, GetFirmwareSummaryResponse, GetFirmwareUpdateStatusRequest,
    GetFirmwareUpdateStatusResponse, GetPowershelvesResponse, ListAvailableFirmwareResponse,
    PmcVendor,
    PowerControlResponse, PowershelfComponent, PowershelfRequest, PowershelfResponse,
    RegisterPowershelfRequest, RegisterPowershelfResponse, RegisterPowershelvesRequest,
    RegisterPowershelvesResponse, SetDryRunRequest, SetDryRunResponse, StatusCode,
    UpdateComponentFirmwareRequest, UpdateComponentFirmwareResponse, UpdateFirmwareRequest,
    UpdateFirmwareResponse, UpdatePowershelfFirmwareResponse,
    powershelf_manager_server::{PowershelfManager as PowershelfManagerRpc, PowershelfManagerServer},
};

/// Per-item failure: status class plus message.
type ItemError = (StatusCode, String);

fn item_error<E: Classify + std::fmt::Display>(err: &E) -> ItemError {
    (StatusCode::from(err.category()), err.to_string())
}

fn invalid(msg: impl Into<String>) -> ItemError {
    (StatusCode::InvalidArgument, msg.into())
}

/// Serves the power shelf manager over gRPC.
#[derive(Clone)]
pub struct PowershelfGrpc {
    manager: Arc<PowershelfManager>,
}

impl PowershelfGrpc {
    pub fn new(manager: Arc<PowershelfManager>) -> Self {
        Self { manager }
    }

    /// Wrap into the generated tower service.
    pub fn into_server(self) -> PowershelfManagerServer<Self> {
        PowershelfManagerServer::new(self)
    }

    fn registration(req: &RegisterPowershelfRequest) -> Result<PmcAccess, ItemError> {
        let mac: MacAddr = req.pmc_mac_address.parse().map_err(|e| item_error(&e))?;
        let ip: IpAddr = req.pmc_ip_address.parse().map_err(|_parse| {
            item_error(&ValidationError::invalid_format(
                "pmc_ip_address",
                req.pmc_ip_address.as_str(),
            ))
        })?;
        let vendor = PmcVendor::try_from(req.pmc_vendor)
            .map(Vendor::from)
            .unwrap_or(Vendor::Unsupported);
        if !vendor.is_supported() {
            return Err(invalid(format!("unsupported PMC vendor {}", req.pmc_vendor)));
        }
        let credential = req
            .pmc_credentials
            .as_ref()
            .map(|c| Credential::new(c.username.clone(), c.password.clone()))
            .filter(Credential::is_valid)
            .ok_or_else(|| item_error(&ValidationError::required("pmc_credentials")))?;
        Ok(PmcAccess::new(Pmc::new(mac, ip, vendor), credential))
    }

    async fn register_one(&self, req: &RegisterPowershelfRequest) -> RegisterPowershelfResponse {
        let outcome = match Self::registration(req) {
            Ok(access) => self
                .manager
                .register_pmc(&access)
                .await
                .map_err(|e| item_error(&e)),
            Err(e) => Err(e),
        };
        let (is_new, status, error) = match outcome {
            Ok(()) => {
                info!(
                    pmc = %req.pmc_mac_address,
                    ip = %req.pmc_ip_address,
                    "registered powershelf"
                );
                (true, StatusCode::Success, String::new())
            }
            Err((status, error)) => {
                warn!(pmc = %req.pmc_mac_address, %error, "powershelf registration failed");
                (status != StatusCode::Conflict, status, error)
            }
        };
        RegisterPowershelfResponse {
            pmc_mac_address: req.pmc_mac_address.clone(),
            is_new,
            created: Some(proto::timestamp(Utc::now())),
            status: status.into(),
            error,
        }
    }

    async fn available_one(&self, mac: &str) -> AvailableFirmware {
        let mut out = AvailableFirmware {
            pmc_mac_address: mac.to_string(),
            ..AvailableFirmware::default()
        };
        match self.manager.list_available_firmware(mac).await {
            Ok(upgrades) => {
                out.upgrades = vec![ComponentFirmwareUpgrades {
                    component: PowershelfComponent::Pmc.into(),
                    upgrades: upgrades
                        .iter()
                        .map(|u| proto::FirmwareVersion {
                            version: u.to.to_string(),
                        })
                        .collect(),
                }];
            }
            Err(e) => {
                let (status, error) = item_error(&e);
                out.status = status.into();
                out.error = error;
            }
        }
        out
    }

    async fn update_one(
        &self,
        mac: &str,
        req: &UpdateComponentFirmwareRequest,
    ) -> UpdateComponentFirmwareResponse {
        let outcome = match PowershelfComponent::try_from(req.component) {
            Err(_unknown) => Err(invalid(format!("unknown component {}", req.component))),
            Ok(PowershelfComponent::Psu) => {
                Err(invalid("upgrading the PSU component is not supported"))
            }
            Ok(component) => match &req.upgrade_to {
                None => Err(item_error(&ValidationError::required("upgrade_to"))),
                Some(target) => self
                    .manager
                    .upgrade_firmware(mac, component.into(), &target.version)
                    .await
                    .map(|_record| ())
                    .map_err(|e| item_error(&e)),
            },
        };
        let (status, error) = match outcome {
            Ok(()) => (StatusCode::Success, String::new()),
            Err(e) => e,
        };
        UpdateComponentFirmwareResponse {
            component: req.component,
            status: status.into(),
            error,
        }
    }

    async fn status_one(&self, query: &FirmwareUpdateQuery) -> FirmwareUpdateStatus {
        let outcome = match PowershelfComponent::try_from(query.component) {
            Err(_unknown) => Err(invalid(format!("unknown component {}", query.component))),
            Ok(component) => self
                .manager
                .get_firmware_update_status(&query.pmc_mac_address, component.into())
                .await
                .map_err(|e| item_error(&e)),
        };
        match outcome {
            Ok(update) => proto::update_status(&query.pmc_mac_address, &update),
            Err((status, error)) => FirmwareUpdateStatus {
                pmc_mac_address: query.pmc_mac_address.clone(),
                component: query.component,
                status: status.into(),
                error,
                ..FirmwareUpdateStatus::default()
            },
        }
    }

    fn power_response(mac: &str, result: crate::manager::Result<()>) -> PowershelfResponse {
        let (status, error) = match result {
            Ok(()) => (StatusCode::Success, String::new()),
            Err(e) => item_error(&e),
        };
        PowershelfResponse {
            pmc_mac_address: mac.to_string(),
            status: status.into(),
            error,
        }
    }
}

#[tonic::async_trait]
impl PowershelfManagerRpc for PowershelfGrpc {
    async fn register_powershelves(
        &self,
        request: Request<RegisterPowershelvesRequest>,
    ) -> Result<Response<RegisterPowershelvesResponse>, Status> {
        let req = request.into_inner();
        debug!(count = req.registration_requests.len(), "RegisterPowershelves");
        let mut responses = Vec::with_capacity(req.registration_requests.len());
        for item in &req.registration_requests {
            responses.push(self.register_one(item).await);
        }
        Ok(Response::new(RegisterPowershelvesResponse { responses }))
    }

    async fn get_powershelves(
        &self,
        request: Request<PowershelfRequest>,
    ) -> Result<Response<GetPowershelvesResponse>, Status> {
        let req = request.into_inner();
        let shelves = self
            .manager
            .get_powershelves(&req.pmc_macs)
            .map_err(|e| proto::to_status(&e))?;
        debug!(requested = req.pmc_macs.len(), found = shelves.len(), "GetPowershelves");
        Ok(Response::new(GetPowershelvesResponse {
            powershelves: shelves.iter().map(proto::powershelf).collect(),
        }))
    }

    async fn list_available_firmware(
        &self,
        request: Request<PowershelfRequest>,
    ) -> Result<Response<ListAvailableFirmwareResponse>, Status> {
        let req = request.into_inner();
        let mut upgrades = Vec::with_capacity(req.pmc_macs.len());
        for mac in &req.pmc_macs {
            upgrades.push(self.available_one(mac).await);
        }
        Ok(Response::new(ListAvailableFirmwareResponse { upgrades }))
    }

    async fn can_update_firmware(
        &self,
        request: Request<CanUpdateFirmwareRequest>,
    ) -> Result<Response<CanUpdateFirmwareResponse>, Status> {
        let req = request.into_inner();
        let component: PowershelfComponent = proto::enum_field("component", req.component)?;
        let target = req
            .upgrade_to
            .ok_or_else(|| proto::to_status(&ValidationError::required("upgrade_to")))?;
        let can_update = self
            .manager
            .can_update_firmware(&req.pmc_mac_address, component.into(), &target.version)
            .await
            .map_err(|e| proto::to_status(&e))?;
        Ok(Response::new(CanUpdateFirmwareResponse { can_update }))
    }

    async fn update_firmware(
        &self,
        request: Request<UpdateFirmwareRequest>,
    ) -> Result<Response<UpdateFirmwareResponse>, Status> {
        let req = request.into_inner();
        let mut responses = Vec::with_capacity(req.upgrades.len());
        for shelf in &req.upgrades {
            let mut components = Vec::with_capacity(shelf.components.len());
            for component in &shelf.components {
                components.push(self.update_one(&shelf.pmc_mac_address, component).await);
            }
            responses.push(UpdatePowershelfFirmwareResponse {
                pmc_mac_address: shelf.pmc_mac_address.clone(),
                components,
            });
        }
        Ok(Response::new(UpdateFirmwareResponse { responses }))
    }

    async fn get_firmware_update_status(
        &self,
        request: Request<GetFirmwareUpdateStatusRequest>,
    ) -> Result<Response<GetFirmwareUpdateStatusResponse>, Status> {
        let req = request.into_inner();
        let mut statuses = Vec::with_capacity(req.queries.len());
        for query in &req.queries {
            statuses.push(self.status_one(query).await);
        }
        Ok(Response::new(GetFirmwareUpdateStatusResponse { statuses }))
    }

    async fn get_firmware_summary(
        &self,
        _request: Request<GetFirmwareSummaryRequest>,
    ) -> Result<Response<GetFirmwareSummaryResponse>, Status> {
        let summary = self
            .manager
            .firmware_summary()
            .await
            .map_err(|e| proto::to_status(&e))?;
        Ok(Response::new(GetFirmwareSummaryResponse { summary }))
    }

    async fn set_dry_run(
        &self,
        request: Request<SetDryRunRequest>,
    ) -> Result<Response<SetDryRunResponse>, Status> {
        let dry_run = request.into_inner().dry_run;
        info!(dry_run, "SetDryRun");
        self.manager.set_dry_run(dry_run);
        Ok(Response::new(SetDryRunResponse {
            dry_run: self.manager.dry_run(),
        }))
    }

    async fn power_on(
        &self,
        request: Request<PowershelfRequest>,
    ) -> Result<Response<PowerControlResponse>, Status> {
        let req = request.into_inner();
        let mut responses = Vec::with_capacity(req.pmc_macs.len());
        for mac in &req.pmc_macs {
            responses.push(Self::power_response(mac, self.manager.power_on(mac).await));
        }
        Ok(Response::new(PowerControlResponse { responses }))
    }

    async fn power_off(
        &self,
        request: Request<PowershelfRequest>,
    ) -> Result<Response<PowerControlResponse>, Status> {
        let req = request.into_inner();
        let mut responses = Vec::with_capacity(req.pmc_macs.len());
        for mac in &req.pmc_macs {
            responses.push(Self::power_response(mac, self.manager.power_off(mac).await));
        }
        Ok(Response::new(PowerControlResponse { responses }))
    }
}
