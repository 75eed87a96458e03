//! Driver-side callback layer for Livox lidars.
//!
//! `LidarCallback` reacts to SDK events: it pushes the user-declared
//! configuration to each lidar, tracks which settings are still pending and
//! moves the device to sampling once they are acknowledged. Diagnostic
//! internal-info responses are decoded by `ParseLidarStateInfo`.

use std::fmt;
use std::net::Ipv4Addr;

#[macro_use]
extern crate num_derive;

pub mod callbacks;
pub mod config;
pub mod device;
pub mod enums;
pub mod error;
pub mod internal_info;
pub mod sdk;

pub use callbacks::LidarCallback;
pub use config::{ConfigurationIntent, DriverConfig, FovCfg, FovEnable, InstallAttitude, UserLidarConfig};
pub use device::{DeviceRegistry, LidarDevice};
pub use enums::*;
pub use error::{ConfigError, DecodeError, RegistryError};
pub use internal_info::{DecodedStateInfo, DirectLidarStateInfo, HostIpCfg, ParamKey, ParseLidarStateInfo};
pub use sdk::{AsyncControlResponse, DiagInternalInfoResponse, LidarInfo, LidarSdk, SetRequest};

/// The SDK derives a lidar's handle from its IPv4 address, first octet in
/// the low byte.
pub fn ip_to_handle(ip: Ipv4Addr) -> u32 {
    u32::from_le_bytes(ip.octets())
}

pub fn handle_to_ip(handle: u32) -> Ipv4Addr {
    Ipv4Addr::from(handle.to_le_bytes())
}

/// Log prefix naming the device behind a handle, e.g. `[192.168.1.12] `.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpPrefix(pub u32);

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", handle_to_ip(self.0))
    }
}
