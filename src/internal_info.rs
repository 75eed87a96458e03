//! Decoder for the diagnostic internal-info response.
//!
//! The record area is a sequence of `key: u16, length: u16, value[length]`
//! records, little-endian. Only the network-addressing keys are decoded;
//! everything else is skipped by length.

use std::collections::BTreeSet;
use std::io::Cursor;
use std::net::Ipv4Addr;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use num_traits::FromPrimitive;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::DecodeError;
use crate::sdk::DiagInternalInfoResponse;

pub const RECORD_HEADER_SIZE: usize = 4;
const IP_SIZE: usize = 4;
const LIDAR_IP_FULL_SIZE: usize = 12;
const IP_CFG_SIZE: usize = 8;

/// Keys this decoder understands.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
pub enum ParamKey {
    LidarIpCfg = 0x0004,
    StateInfoHostIpCfg = 0x0005,
    PointDataHostIpCfg = 0x0006,
    ImuHostIpCfg = 0x0007,
}

impl ParamKey {
    fn json_name(self) -> &'static str {
        match self {
            ParamKey::LidarIpCfg => "lidar_ip_cfg",
            ParamKey::StateInfoHostIpCfg => "state_info_host_ip_cfg",
            ParamKey::PointDataHostIpCfg => "point_data_host_ip_cfg",
            ParamKey::ImuHostIpCfg => "imu_host_ip_cfg",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LidarIpInfo {
    pub ip_addr: Option<Ipv4Addr>,
    pub net_mask: Option<Ipv4Addr>,
    pub gw_addr: Option<Ipv4Addr>,
}

/// Addressing of one data channel. The lidar end uses `LidarIpInfo::ip_addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostIpCfg {
    pub host_ip: Ipv4Addr,
    pub host_port: u16,
    pub lidar_port: u16,
}

impl Default for HostIpCfg {
    fn default() -> Self {
        HostIpCfg {
            host_ip: Ipv4Addr::UNSPECIFIED,
            host_port: 0,
            lidar_port: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectLidarStateInfo {
    pub lidar_ip_info: LidarIpInfo,
    pub state_info_host: HostIpCfg,
    pub point_data_host: HostIpCfg,
    pub imu_data_host: HostIpCfg,
}

/// Decode result: the fields plus the keys that were actually present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedStateInfo {
    pub info: DirectLidarStateInfo,
    pub keys: BTreeSet<ParamKey>,
}

pub struct ParseLidarStateInfo;

impl ParseLidarStateInfo {
    /// Decodes `resp` and renders the reported fields as JSON text.
    pub fn parse(resp: &DiagInternalInfoResponse) -> Result<String, DecodeError> {
        let decoded = Self::parse_state_info(resp)?;
        Ok(Self::to_json(&decoded).to_string())
    }

    pub fn parse_state_info(resp: &DiagInternalInfoResponse) -> Result<DecodedStateInfo, DecodeError> {
        let data = &resp.data[..];
        let mut decoded = DecodedStateInfo::default();
        let mut off = 0;
        let mut records = 0;

        while off < data.len() {
            let remaining = data.len() - off;
            if remaining < RECORD_HEADER_SIZE {
                return Err(DecodeError::TruncatedHeader { offset: off, remaining });
            }
            let mut rdr = Cursor::new(&data[off..off + RECORD_HEADER_SIZE]);
            let key = rdr
                .read_u16::<LittleEndian>()
                .map_err(|_| DecodeError::TruncatedHeader { offset: off, remaining })?;
            let length = rdr
                .read_u16::<LittleEndian>()
                .map_err(|_| DecodeError::TruncatedHeader { offset: off, remaining })?
                as usize;
            off += RECORD_HEADER_SIZE;

            if length > data.len() - off {
                return Err(DecodeError::LengthOverrun {
                    key,
                    offset: off - RECORD_HEADER_SIZE,
                    length,
                    remaining: data.len() - off,
                });
            }
            let value = &data[off..off + length];

            match ParamKey::from_u16(key) {
                Some(ParamKey::LidarIpCfg) => {
                    Self::parse_lidar_ip_addr(key, value, &mut decoded.info)?;
                    decoded.keys.insert(ParamKey::LidarIpCfg);
                }
                Some(ParamKey::StateInfoHostIpCfg) => {
                    decoded.info.state_info_host = Self::parse_ip_cfg(key, value)?;
                    decoded.keys.insert(ParamKey::StateInfoHostIpCfg);
                }
                Some(ParamKey::PointDataHostIpCfg) => {
                    decoded.info.point_data_host = Self::parse_ip_cfg(key, value)?;
                    decoded.keys.insert(ParamKey::PointDataHostIpCfg);
                }
                Some(ParamKey::ImuHostIpCfg) => {
                    decoded.info.imu_data_host = Self::parse_ip_cfg(key, value)?;
                    decoded.keys.insert(ParamKey::ImuHostIpCfg);
                }
                None => debug!("skipping internal info key {:#06x}, {} bytes", key, length),
            }

            off += length;
            records += 1;
        }

        if records != resp.param_num as usize {
            debug!(
                "internal info header announced {} params, found {}",
                resp.param_num, records
            );
        }
        Ok(decoded)
    }

    fn parse_lidar_ip_addr(key: u16, value: &[u8], info: &mut DirectLidarStateInfo) -> Result<(), DecodeError> {
        if value.len() < IP_SIZE {
            return Err(DecodeError::FieldTooShort {
                key,
                length: value.len(),
                need: IP_SIZE,
            });
        }
        // Mask and gateway come as a pair or not at all.
        let (net_mask, gw_addr) = if value.len() >= LIDAR_IP_FULL_SIZE {
            (Some(read_ip(&value[4..8])), Some(read_ip(&value[8..12])))
        } else {
            (None, None)
        };
        info.lidar_ip_info = LidarIpInfo {
            ip_addr: Some(read_ip(&value[0..4])),
            net_mask,
            gw_addr,
        };
        Ok(())
    }

    fn parse_ip_cfg(key: u16, value: &[u8]) -> Result<HostIpCfg, DecodeError> {
        if value.len() < IP_CFG_SIZE {
            return Err(DecodeError::FieldTooShort {
                key,
                length: value.len(),
                need: IP_CFG_SIZE,
            });
        }
        Ok(HostIpCfg {
            host_ip: read_ip(&value[0..4]),
            host_port: LittleEndian::read_u16(&value[4..6]),
            lidar_port: LittleEndian::read_u16(&value[6..8]),
        })
    }

    /// Only keys present in `decoded.keys` are emitted.
    pub fn to_json(decoded: &DecodedStateInfo) -> Value {
        let info = &decoded.info;
        let mut root = Map::new();
        for key in decoded.keys.iter() {
            let value = match key {
                ParamKey::LidarIpCfg => {
                    let mut ip = Map::new();
                    let fields = [
                        ("lidar_ip", info.lidar_ip_info.ip_addr),
                        ("lidar_subnet_mask", info.lidar_ip_info.net_mask),
                        ("lidar_gateway", info.lidar_ip_info.gw_addr),
                    ];
                    for (name, addr) in fields.iter() {
                        if let Some(addr) = addr {
                            ip.insert(name.to_string(), Value::String(addr.to_string()));
                        }
                    }
                    Value::Object(ip)
                }
                ParamKey::StateInfoHostIpCfg => ip_cfg_json(&info.state_info_host),
                ParamKey::PointDataHostIpCfg => ip_cfg_json(&info.point_data_host),
                ParamKey::ImuHostIpCfg => ip_cfg_json(&info.imu_data_host),
            };
            root.insert(key.json_name().to_string(), value);
        }
        Value::Object(root)
    }
}

fn read_ip(bytes: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])
}

fn ip_cfg_json(cfg: &HostIpCfg) -> Value {
    json!({
        "host_ip": cfg.host_ip.to_string(),
        "host_port": cfg.host_port,
        "lidar_port": cfg.lidar_port,
    })
}
