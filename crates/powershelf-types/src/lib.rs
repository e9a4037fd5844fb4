//! Identity and access types for power shelf controllers
//!
//! A power shelf is driven by a single Power Management Controller (PMC).
//! Everything else in the workspace addresses a PMC by its hardware address
//! ([`MacAddr`]) and reaches it over the network at its registered IP, using
//! a [`Credential`] that is owned by a separate credential store.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

mod component;
mod credential;
mod mac;
mod pmc;
mod vendor;

pub use component::Component;
pub use credential::{Credential, PASSWORD_KEY, USERNAME_KEY};
pub use mac::MacAddr;
pub use pmc::{Pmc, PmcAccess};
pub use vendor::Vendor;
