use std::collections::HashMap;

use crate::config::ConfigurationIntent;
use crate::enums::{ConfigBit, ConnectState};
use crate::error::RegistryError;

/// Per-device state owned by the registry for the device's connected lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct LidarDevice {
    /// Target configuration; `config.handle` identifies the device.
    pub config: ConfigurationIntent,
    /// Pending-configuration mask, see `ConfigBit`.
    pub set_bits: u32,
    pub connect_state: ConnectState,
}

impl LidarDevice {
    pub fn new(config: ConfigurationIntent) -> LidarDevice {
        LidarDevice {
            config,
            set_bits: 0,
            connect_state: ConnectState::Off,
        }
    }

    pub fn mark_pending(&mut self, bit: ConfigBit) {
        self.set_bits |= bit as u32;
    }

    /// Clears one pending bit. Moves the device to `Sampling` and returns
    /// true once nothing is left pending.
    pub fn clear_pending(&mut self, bit: ConfigBit) -> bool {
        self.set_bits &= !(bit as u32);
        if self.set_bits == 0 {
            self.connect_state = ConnectState::Sampling;
            true
        } else {
            false
        }
    }
}

/// Fixed-capacity table of lidar devices indexed by handle.
#[derive(Debug)]
pub struct DeviceRegistry {
    slots: Vec<Option<LidarDevice>>,
    index: HashMap<u32, usize>,
}

impl DeviceRegistry {
    pub fn new(capacity: usize) -> DeviceRegistry {
        DeviceRegistry {
            slots: (0..capacity).map(|_| None).collect(),
            index: HashMap::new(),
        }
    }

    /// Builds a registry pre-populated with the user-declared devices.
    pub fn with_intents<I>(capacity: usize, intents: I) -> Result<DeviceRegistry, RegistryError>
    where
        I: IntoIterator<Item = ConfigurationIntent>,
    {
        let mut registry = DeviceRegistry::new(capacity);
        for intent in intents {
            registry.register(intent)?;
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Inserts or replaces the record for `intent.handle`.
    pub fn register(&mut self, intent: ConfigurationIntent) -> Result<&mut LidarDevice, RegistryError> {
        let handle = intent.handle;
        let slot = match self.index.get(&handle) {
            Some(&slot) => slot,
            None => self.free_slot(handle)?,
        };
        self.index.insert(handle, slot);
        Ok(self.slots[slot].insert(LidarDevice::new(intent)))
    }

    /// Returns the device for `handle`, allocating an all-unset record when
    /// it is not known yet. The flag is true for a fresh allocation.
    pub fn get_or_allocate(&mut self, handle: u32) -> Result<(&mut LidarDevice, bool), RegistryError> {
        if !self.index.contains_key(&handle) {
            let device = self.register(ConfigurationIntent::unset(handle))?;
            return Ok((device, true));
        }
        let capacity = self.slots.len();
        self.resolve(handle)
            .map(|device| (device, false))
            .ok_or(RegistryError::Full { handle, capacity })
    }

    /// Pure lookup. `None` is an expected outcome for late completions.
    pub fn resolve(&mut self, handle: u32) -> Option<&mut LidarDevice> {
        let slot = *self.index.get(&handle)?;
        self.slots[slot].as_mut()
    }

    pub fn get(&self, handle: u32) -> Option<&LidarDevice> {
        let slot = *self.index.get(&handle)?;
        self.slots[slot].as_ref()
    }

    pub fn remove(&mut self, handle: u32) -> Option<LidarDevice> {
        let slot = self.index.remove(&handle)?;
        self.slots[slot].take()
    }

    fn free_slot(&self, handle: u32) -> Result<usize, RegistryError> {
        self.slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(RegistryError::Full {
                handle,
                capacity: self.slots.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::PointDataType;

    fn intent(handle: u32) -> ConfigurationIntent {
        ConfigurationIntent {
            pcl_data_type: Some(PointDataType::Spherical),
            ..ConfigurationIntent::unset(handle)
        }
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let mut registry = DeviceRegistry::with_intents(4, vec![intent(7)]).unwrap();
        assert_eq!(registry.len(), 1);
        let device = registry.resolve(7).unwrap();
        assert_eq!(device.config.pcl_data_type, Some(PointDataType::Spherical));
        assert!(registry.resolve(8).is_none());
    }

    #[test]
    fn test_get_or_allocate() {
        let mut registry = DeviceRegistry::with_intents(2, vec![intent(1)]).unwrap();

        let (device, fresh) = registry.get_or_allocate(1).unwrap();
        assert!(!fresh);
        assert_eq!(device.config.pcl_data_type, Some(PointDataType::Spherical));

        let (device, fresh) = registry.get_or_allocate(2).unwrap();
        assert!(fresh);
        assert_eq!(device.config, ConfigurationIntent::unset(2));

        assert_eq!(
            registry.get_or_allocate(3).unwrap_err(),
            RegistryError::Full { handle: 3, capacity: 2 }
        );
    }

    #[test]
    fn test_remove_frees_slot() {
        let mut registry = DeviceRegistry::with_intents(1, vec![intent(1)]).unwrap();
        assert!(registry.remove(1).is_some());
        assert!(registry.resolve(1).is_none());
        assert!(registry.is_empty());
        assert!(registry.get_or_allocate(2).is_ok());
    }

    #[test]
    fn test_clear_pending_transitions_on_empty_mask() {
        let mut device = LidarDevice::new(intent(1));
        device.mark_pending(ConfigBit::DataType);
        device.mark_pending(ConfigBit::DualEmit);

        assert!(!device.clear_pending(ConfigBit::DataType));
        assert_eq!(device.set_bits, ConfigBit::DualEmit as u32);
        assert_eq!(device.connect_state, ConnectState::Off);

        assert!(device.clear_pending(ConfigBit::DualEmit));
        assert_eq!(device.set_bits, 0);
        assert_eq!(device.connect_state, ConnectState::Sampling);
    }

    #[test]
    fn test_concurrent_clears_reach_sampling_once() {
        use std::sync::{Arc, Mutex};
        use std::thread;

        let mut device = LidarDevice::new(intent(1));
        let bits = [
            ConfigBit::DataType,
            ConfigBit::ScanPattern,
            ConfigBit::BlindSpot,
            ConfigBit::DualEmit,
        ];
        for &bit in bits.iter() {
            device.mark_pending(bit);
        }
        let device = Arc::new(Mutex::new(device));

        let workers: Vec<_> = bits
            .iter()
            .map(|&bit| {
                let device = Arc::clone(&device);
                thread::spawn(move || {
                    let emptied = device.lock().unwrap().clear_pending(bit);
                    emptied
                })
            })
            .collect();
        let emptied = workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .filter(|&emptied| emptied)
            .count();

        assert_eq!(emptied, 1);
        let device = device.lock().unwrap();
        assert_eq!(device.set_bits, 0);
        assert_eq!(device.connect_state, ConnectState::Sampling);
    }
}
