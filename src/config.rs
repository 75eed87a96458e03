//! User lidar configuration.
//!
//! The on-disk format keeps the vendor's sentinel values (`-1` for "leave
//! unchanged", `255` for the FOV enable byte). They are turned into explicit
//! unset markers once, when a `UserLidarConfig` becomes a `ConfigurationIntent`.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::enums::{PointDataType, ScanPattern};
use crate::error::ConfigError;
use crate::ip_to_handle;

/// Sentinel for the signed scalar fields.
pub const UNSET: i32 = -1;
/// Sentinel for `fov_cfg_en`. Distinct from `UNSET`.
pub const FOV_EN_UNSET: u8 = 255;

pub const DEFAULT_WORK_MODE_RETRY_MS: u64 = 1000;
pub const DEFAULT_MAX_LIDAR_COUNT: usize = 32;

fn unset() -> i32 {
    UNSET
}

fn fov_en_unset() -> u8 {
    FOV_EN_UNSET
}

fn default_retry_ms() -> u64 {
    DEFAULT_WORK_MODE_RETRY_MS
}

fn default_max_lidar_count() -> usize {
    DEFAULT_MAX_LIDAR_COUNT
}

/// One field-of-view sector, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FovCfg {
    pub yaw_start: i32,
    pub yaw_stop: i32,
    pub pitch_start: i32,
    pub pitch_stop: i32,
}

/// Mounting attitude. Angles in degrees, offsets in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallAttitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// FOV sector enable byte. Bit 0 selects sector 0, bit 1 sector 1; the raw
/// value 255 means "do not touch".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FovEnable(Option<u8>);

impl FovEnable {
    pub fn unset() -> FovEnable {
        FovEnable(None)
    }

    pub fn from_raw(raw: u8) -> FovEnable {
        if raw == FOV_EN_UNSET {
            FovEnable(None)
        } else {
            FovEnable(Some(raw))
        }
    }

    pub fn mask(self) -> Option<u8> {
        self.0
    }

    pub fn sector(self, index: u8) -> bool {
        match self.0 {
            Some(mask) => mask & (0x01 << index) != 0,
            None => false,
        }
    }
}

impl Default for FovEnable {
    fn default() -> Self {
        FovEnable::unset()
    }
}

/// Target configuration of one lidar. `None` means "leave the device alone".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigurationIntent {
    pub handle: u32,
    pub pcl_data_type: Option<PointDataType>,
    pub pattern_mode: Option<ScanPattern>,
    pub blind_spot_set: Option<u32>,
    pub dual_emit_en: Option<bool>,
    pub fov_cfg_en: FovEnable,
    pub fov_cfg0: FovCfg,
    pub fov_cfg1: FovCfg,
    pub attitude: InstallAttitude,
}

impl ConfigurationIntent {
    /// An intent that requests no change on any dimension.
    pub fn unset(handle: u32) -> ConfigurationIntent {
        ConfigurationIntent {
            handle,
            ..Default::default()
        }
    }
}

/// A `lidar_configs` entry as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLidarConfig {
    pub ip: String,
    #[serde(default = "unset")]
    pub pcl_data_type: i32,
    #[serde(default = "unset")]
    pub pattern_mode: i32,
    #[serde(default = "unset")]
    pub blind_spot_set: i32,
    #[serde(default = "unset")]
    pub dual_emit_en: i32,
    #[serde(default = "fov_en_unset")]
    pub fov_cfg_en: u8,
    #[serde(default)]
    pub fov_cfg0: FovCfg,
    #[serde(default)]
    pub fov_cfg1: FovCfg,
    #[serde(default)]
    pub extrinsic_parameter: InstallAttitude,
}

impl UserLidarConfig {
    pub fn handle(&self) -> Result<u32, ConfigError> {
        let ip: Ipv4Addr = self
            .ip
            .parse()
            .map_err(|_| ConfigError::InvalidIp(self.ip.clone()))?;
        Ok(ip_to_handle(ip))
    }

    pub fn to_intent(&self) -> Result<ConfigurationIntent, ConfigError> {
        let pcl_data_type = match self.pcl_data_type {
            UNSET => None,
            v => Some(PointDataType::from_i32(v).ok_or(ConfigError::InvalidValue {
                field: "pcl_data_type",
                value: v as i64,
            })?),
        };
        let pattern_mode = match self.pattern_mode {
            UNSET => None,
            v => Some(ScanPattern::from_i32(v).ok_or(ConfigError::InvalidValue {
                field: "pattern_mode",
                value: v as i64,
            })?),
        };
        let blind_spot_set = match self.blind_spot_set {
            UNSET => None,
            v if v < 0 => {
                return Err(ConfigError::InvalidValue {
                    field: "blind_spot_set",
                    value: v as i64,
                })
            }
            v => Some(v as u32),
        };
        let dual_emit_en = match self.dual_emit_en {
            UNSET => None,
            v => Some(v != 0),
        };

        Ok(ConfigurationIntent {
            handle: self.handle()?,
            pcl_data_type,
            pattern_mode,
            blind_spot_set,
            dual_emit_en,
            fov_cfg_en: FovEnable::from_raw(self.fov_cfg_en),
            fov_cfg0: self.fov_cfg0,
            fov_cfg1: self.fov_cfg1,
            attitude: self.extrinsic_parameter,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DriverConfigFile {
    #[serde(default = "default_retry_ms")]
    work_mode_retry_ms: u64,
    #[serde(default = "default_max_lidar_count")]
    max_lidar_count: usize,
    #[serde(default)]
    lidar_configs: Vec<UserLidarConfig>,
}

/// Driver settings plus the per-lidar intents they declare.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Delay before a failed work-mode change is retried.
    pub work_mode_retry: Duration,
    /// Number of device slots in the registry.
    pub max_lidar_count: usize,
    pub lidars: Vec<ConfigurationIntent>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            work_mode_retry: Duration::from_millis(DEFAULT_WORK_MODE_RETRY_MS),
            max_lidar_count: DEFAULT_MAX_LIDAR_COUNT,
            lidars: vec![],
        }
    }
}

impl DriverConfig {
    pub fn from_json_str(json: &str) -> Result<DriverConfig, ConfigError> {
        let file: DriverConfigFile = serde_json::from_str(json)?;
        let lidars = file
            .lidar_configs
            .iter()
            .map(UserLidarConfig::to_intent)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DriverConfig {
            work_mode_retry: Duration::from_millis(file.work_mode_retry_ms),
            max_lidar_count: file.max_lidar_count,
            lidars,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<DriverConfig, ConfigError> {
        let json = fs::read_to_string(path)?;
        DriverConfig::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_are_unset() {
        let cfg = DriverConfig::from_json_str(r#"{"lidar_configs":[{"ip":"192.168.1.12"}]}"#)
            .unwrap();
        assert_eq!(cfg.work_mode_retry, Duration::from_millis(1000));
        assert_eq!(cfg.max_lidar_count, 32);
        let intent = &cfg.lidars[0];
        assert_eq!(intent.handle, ip_to_handle(Ipv4Addr::new(192, 168, 1, 12)));
        assert_eq!(intent.pcl_data_type, None);
        assert_eq!(intent.pattern_mode, None);
        assert_eq!(intent.blind_spot_set, None);
        assert_eq!(intent.dual_emit_en, None);
        assert_eq!(intent.fov_cfg_en, FovEnable::unset());
    }

    #[test]
    fn test_explicit_sentinels_are_unset() {
        let json = r#"{"lidar_configs":[{"ip":"10.0.0.2","pcl_data_type":-1,
            "pattern_mode":-1,"blind_spot_set":-1,"dual_emit_en":-1,"fov_cfg_en":255}]}"#;
        let intent = &DriverConfig::from_json_str(json).unwrap().lidars[0];
        assert_eq!(*intent, ConfigurationIntent::unset(intent.handle));
    }

    #[test]
    fn test_full_entry() {
        let json = r#"{
            "work_mode_retry_ms": 250,
            "max_lidar_count": 4,
            "lidar_configs": [{
                "ip": "192.168.1.100",
                "pcl_data_type": 1,
                "pattern_mode": 0,
                "blind_spot_set": 50,
                "dual_emit_en": 0,
                "fov_cfg_en": 3,
                "fov_cfg0": {"yaw_start": 0, "yaw_stop": 180, "pitch_start": -7, "pitch_stop": 52},
                "extrinsic_parameter": {"roll": 1.5, "pitch": 0.0, "yaw": 90.0, "x": 10, "y": 0, "z": -5}
            }]
        }"#;
        let cfg = DriverConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.work_mode_retry, Duration::from_millis(250));
        assert_eq!(cfg.max_lidar_count, 4);
        let intent = &cfg.lidars[0];
        assert_eq!(intent.pcl_data_type, Some(PointDataType::CartesianHighData));
        assert_eq!(intent.pattern_mode, Some(ScanPattern::NonRepetitive));
        assert_eq!(intent.blind_spot_set, Some(50));
        assert_eq!(intent.dual_emit_en, Some(false));
        assert_eq!(intent.fov_cfg_en.mask(), Some(3));
        assert!(intent.fov_cfg_en.sector(0));
        assert!(intent.fov_cfg_en.sector(1));
        assert_eq!(intent.fov_cfg0.pitch_start, -7);
        assert_eq!(intent.fov_cfg1, FovCfg::default());
        assert_eq!(intent.attitude.yaw, 90.0);
        assert_eq!(intent.attitude.z, -5);
    }

    #[test]
    fn test_fov_enable_zero_is_set() {
        let fov = FovEnable::from_raw(0);
        assert_eq!(fov.mask(), Some(0));
        assert!(!fov.sector(0));
        assert!(!fov.sector(1));
    }

    #[test]
    fn test_invalid_values() {
        let bad_ip = DriverConfig::from_json_str(r#"{"lidar_configs":[{"ip":"lidar"}]}"#);
        assert!(matches!(bad_ip, Err(ConfigError::InvalidIp(_))));

        let bad_type =
            DriverConfig::from_json_str(r#"{"lidar_configs":[{"ip":"1.2.3.4","pcl_data_type":9}]}"#);
        assert!(matches!(
            bad_type,
            Err(ConfigError::InvalidValue { field: "pcl_data_type", value: 9 })
        ));

        let bad_blind =
            DriverConfig::from_json_str(r#"{"lidar_configs":[{"ip":"1.2.3.4","blind_spot_set":-3}]}"#);
        assert!(matches!(bad_blind, Err(ConfigError::InvalidValue { .. })));

        assert!(matches!(
            DriverConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }
}
