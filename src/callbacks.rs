use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{ConfigurationIntent, DriverConfig};
use crate::device::DeviceRegistry;
use crate::enums::{ConfigDimension, ConnectState, LivoxStatus, WorkMode};
use crate::error::RegistryError;
use crate::internal_info::ParseLidarStateInfo;
use crate::sdk::{AsyncControlResponse, DiagInternalInfoResponse, LidarInfo, LidarSdk, SetRequest};
use crate::IpPrefix;

/// Dimensions pushed from the intent on every info change, in issue order.
/// Attitude is appended separately.
const INTENT_DIMENSIONS: [ConfigDimension; 7] = [
    ConfigDimension::DataType,
    ConfigDimension::ScanPattern,
    ConfigDimension::BlindSpot,
    ConfigDimension::DualEmit,
    ConfigDimension::FovCfg0,
    ConfigDimension::FovCfg1,
    ConfigDimension::FovEnable,
];

struct Inner {
    sdk: Arc<dyn LidarSdk>,
    /// Configuration lock: guards every intent and pending mask in the fleet.
    registry: Mutex<DeviceRegistry>,
    work_mode_retry: Duration,
}

/// Reacts to SDK events for every lidar in the fleet.
///
/// Cloning is cheap; each request sent to the SDK carries a clone as its
/// completion handler.
#[derive(Clone)]
pub struct LidarCallback {
    inner: Arc<Inner>,
}

impl LidarCallback {
    /// Builds the callback layer with the devices declared in `config`
    /// already registered.
    pub fn new(sdk: Arc<dyn LidarSdk>, config: &DriverConfig) -> Result<LidarCallback, RegistryError> {
        let registry = DeviceRegistry::with_intents(config.max_lidar_count, config.lidars.iter().cloned())?;
        Ok(LidarCallback {
            inner: Arc::new(Inner {
                sdk,
                registry: Mutex::new(registry),
                work_mode_retry: config.work_mode_retry,
            }),
        })
    }

    /// Takes the configuration lock.
    pub fn registry(&self) -> MutexGuard<'_, DeviceRegistry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry point for the SDK's "lidar info changed" event.
    pub fn on_info_change(&self, handle: u32, info: &LidarInfo) {
        let prefix = IpPrefix(handle);
        debug!("{}lidar info change, type: {}, sn: {}", prefix, info.dev_type, info.sn);

        let mut requests = vec![];
        {
            let mut registry = self.registry();
            match registry.get_or_allocate(handle) {
                Err(e) => {
                    warn!("{}failed to add lidar device: {}", prefix, e);
                    return;
                }
                Ok((device, true)) => {
                    warn!("{}found lidar not defined in the user-defined config", prefix);
                    device.connect_state = ConnectState::Sampling;
                }
                Ok((device, false)) => {
                    for &dimension in INTENT_DIMENSIONS.iter() {
                        let request = match request_for(&device.config, dimension) {
                            Some(request) => request,
                            None => continue,
                        };
                        if let Some(bit) = dimension.mask_bit() {
                            device.mark_pending(bit);
                        }
                        info!("{}set {}: {:?}", prefix, dimension.name(), request);
                        requests.push(request);
                    }
                    device.connect_state = if device.set_bits == 0 {
                        ConnectState::Sampling
                    } else {
                        ConnectState::Configuring
                    };
                    // Attitude is not tracked by the mask and goes out on every change.
                    requests.push(SetRequest::InstallAttitude(device.config.attitude));
                }
            }
        }

        for request in requests {
            self.issue(handle, request);
        }

        info!("{}begin to change work mode to 'Normal'", prefix);
        self.issue(handle, SetRequest::WorkMode(WorkMode::Normal));
        self.issue(handle, SetRequest::EnableImuData);
    }

    /// Completion of a "set" request for `dimension`.
    pub fn on_set_complete(
        &self,
        dimension: ConfigDimension,
        status: LivoxStatus,
        handle: u32,
        response: Option<AsyncControlResponse>,
    ) {
        if dimension == ConfigDimension::WorkMode {
            return self.on_work_mode_changed(status, handle);
        }

        let prefix = IpPrefix(handle);
        let name = dimension.name();
        let retry = {
            let mut registry = self.registry();
            let device = match registry.resolve(handle) {
                Some(device) => device,
                None => {
                    warn!("{}failed to set {} since no lidar device found", prefix, name);
                    return;
                }
            };

            // Lidars without an IMU answer the enable request with no payload.
            if dimension == ConfigDimension::ImuData && response.is_none() {
                warn!("{}set {} failed to get response since no lidar IMU sensor found", prefix, name);
                return;
            }

            match status {
                LivoxStatus::Success => {
                    if response.is_none() {
                        warn!("{}set {} failed to get response", prefix, name);
                        return;
                    }
                    match dimension.mask_bit() {
                        Some(bit) => {
                            device.clear_pending(bit);
                            info!(
                                "{}successfully set {}, set_bits: {:#x}",
                                prefix, name, device.set_bits
                            );
                        }
                        None => info!("{}set {} success.", prefix, name),
                    }
                    return;
                }
                LivoxStatus::Timeout => request_for(&device.config, dimension),
                _ => {
                    match response {
                        Some(resp) => warn!(
                            "{}set {} failed, return code: {}, error key: {}",
                            prefix, name, resp.ret_code, resp.error_key
                        ),
                        None => warn!("{}set {} failed with {:?}", prefix, name, status),
                    }
                    return;
                }
            }
        };

        match retry {
            Some(request) => {
                warn!("{}set {} timeout, try again...", prefix, name);
                self.issue(handle, request);
            }
            None => warn!("{}set {} timeout, no longer requested", prefix, name),
        }
    }

    /// Work-mode changes are retried until they succeed. The retry runs on
    /// its own thread so the SDK's callback thread is never put to sleep.
    fn on_work_mode_changed(&self, status: LivoxStatus, handle: u32) {
        let prefix = IpPrefix(handle);
        if status == LivoxStatus::Success {
            info!("{}change work mode success.", prefix);
            return;
        }

        warn!("{}change work mode failed, try again...", prefix);
        let this = self.clone();
        let delay = self.inner.work_mode_retry;
        let spawned = thread::Builder::new()
            .name("livox-work-mode-retry".into())
            .spawn(move || {
                thread::sleep(delay);
                this.issue(handle, SetRequest::WorkMode(WorkMode::Normal));
            });
        if let Err(e) = spawned {
            warn!("{}failed to schedule work mode retry: {}", prefix, e);
        }
    }

    pub fn on_push_message(&self, handle: u32, dev_type: u8, info: &str) {
        info!("{}push msg info (type {}):\n{}", IpPrefix(handle), dev_type, info);
    }

    pub fn query_internal_info(&self, handle: u32) {
        let this = self.clone();
        self.inner.sdk.query_internal_info(
            handle,
            Box::new(move |status, handle, response| {
                this.on_query_internal_info(status, handle, response)
            }),
        );
    }

    /// Failed queries are re-issued; a decoded response is logged as JSON.
    pub fn on_query_internal_info(
        &self,
        status: LivoxStatus,
        handle: u32,
        response: Option<DiagInternalInfoResponse>,
    ) {
        let prefix = IpPrefix(handle);
        if status != LivoxStatus::Success {
            warn!("{}query lidar internal info failed.", prefix);
            self.query_internal_info(handle);
            return;
        }

        let response = match response {
            Some(response) => response,
            None => return,
        };

        match ParseLidarStateInfo::parse(&response) {
            Ok(text) => info!("{}QueryInternalInfo: {}", prefix, text),
            Err(e) => warn!("{}failed to decode internal info: {}", prefix, e),
        }
    }

    fn issue(&self, handle: u32, request: SetRequest) {
        let this = self.clone();
        let dimension = request.dimension();
        self.inner.sdk.set_parameter(
            handle,
            request,
            Box::new(move |status, handle, response| {
                this.on_set_complete(dimension, status, handle, response)
            }),
        );
    }
}

/// Request carrying the intent's current value for `dimension`, or `None`
/// when the intent leaves it unset.
fn request_for(config: &ConfigurationIntent, dimension: ConfigDimension) -> Option<SetRequest> {
    match dimension {
        ConfigDimension::DataType => config.pcl_data_type.map(SetRequest::PclDataType),
        ConfigDimension::ScanPattern => config.pattern_mode.map(SetRequest::ScanPattern),
        ConfigDimension::BlindSpot => config.blind_spot_set.map(SetRequest::BlindSpot),
        ConfigDimension::DualEmit => config.dual_emit_en.map(SetRequest::DualEmit),
        ConfigDimension::FovCfg0 => config
            .fov_cfg_en
            .sector(0)
            .then(|| SetRequest::FovCfg0(config.fov_cfg0)),
        ConfigDimension::FovCfg1 => config
            .fov_cfg_en
            .sector(1)
            .then(|| SetRequest::FovCfg1(config.fov_cfg1)),
        ConfigDimension::FovEnable => config.fov_cfg_en.mask().map(SetRequest::EnableFov),
        ConfigDimension::Attitude => Some(SetRequest::InstallAttitude(config.attitude)),
        ConfigDimension::ImuData => Some(SetRequest::EnableImuData),
        ConfigDimension::WorkMode => Some(SetRequest::WorkMode(WorkMode::Normal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FovCfg, FovEnable};
    use crate::enums::{PointDataType, ScanPattern};

    #[test]
    fn test_request_for_unset_intent() {
        let intent = ConfigurationIntent::unset(1);
        for &dimension in INTENT_DIMENSIONS.iter() {
            assert_eq!(request_for(&intent, dimension), None, "{:?}", dimension);
        }
        assert!(request_for(&intent, ConfigDimension::Attitude).is_some());
    }

    #[test]
    fn test_request_for_set_intent() {
        let fov = FovCfg {
            yaw_start: 10,
            yaw_stop: 20,
            pitch_start: 0,
            pitch_stop: 30,
        };
        let intent = ConfigurationIntent {
            pcl_data_type: Some(PointDataType::CartesianLowData),
            pattern_mode: Some(ScanPattern::Repetitive),
            blind_spot_set: Some(0),
            dual_emit_en: Some(true),
            fov_cfg_en: FovEnable::from_raw(0x02),
            fov_cfg1: fov,
            ..ConfigurationIntent::unset(1)
        };
        assert_eq!(
            request_for(&intent, ConfigDimension::DataType),
            Some(SetRequest::PclDataType(PointDataType::CartesianLowData))
        );
        assert_eq!(
            request_for(&intent, ConfigDimension::BlindSpot),
            Some(SetRequest::BlindSpot(0))
        );
        assert_eq!(request_for(&intent, ConfigDimension::FovCfg0), None);
        assert_eq!(
            request_for(&intent, ConfigDimension::FovCfg1),
            Some(SetRequest::FovCfg1(fov))
        );
        assert_eq!(
            request_for(&intent, ConfigDimension::FovEnable),
            Some(SetRequest::EnableFov(0x02))
        );
    }
}
