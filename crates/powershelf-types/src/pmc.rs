use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::{Credential, MacAddr, Vendor};

/// A registered PMC: who it is, where it lives, who made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pmc {
    pub mac: MacAddr,
    pub ip: IpAddr,
    pub vendor: Vendor,
}

impl Pmc {
    pub fn new(mac: MacAddr, ip: IpAddr, vendor: Vendor) -> Self {
        Self { mac, ip, vendor }
    }
}

/// A registration joined with its current credential. Built per device
/// interaction and never cached, since either half may rotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmcAccess {
    pub pmc: Pmc,
    pub credential: Credential,
}

impl PmcAccess {
    pub fn new(pmc: Pmc, credential: Credential) -> Self {
        Self { pmc, credential }
    }

    pub fn mac(&self) -> MacAddr {
        self.pmc.mac
    }
}
