/// Completion status reported by the SDK for every asynchronous request.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum LivoxStatus {
    Success = 0,
    Failure = -1,
    NotConnected = -2,
    NotSupported = -3,
    Timeout = -4,
    NotEnoughMemory = -5,
    ChannelNotExist = -6,
    InvalidHandle = -7,
    HandlerImplNotExist = -8,
    SendFailed = -9,
}

impl LivoxStatus {
    /// Maps a raw SDK status code, folding unknown codes into `Failure`.
    pub fn from_raw(code: i32) -> LivoxStatus {
        <LivoxStatus as num_traits::FromPrimitive>::from_i32(code).unwrap_or(LivoxStatus::Failure)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum WorkMode {
    Normal = 0x01,
    WakeUp = 0x02,
    Sleep = 0x03,
    Error = 0x04,
    PowerOnSelfTest = 0x05,
    MotorStarting = 0x06,
    MotorStopping = 0x07,
    Upgrade = 0x08,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum PointDataType {
    CartesianHighData = 0x01,
    CartesianLowData = 0x02,
    Spherical = 0x03,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ScanPattern {
    NonRepetitive = 0x00,
    Repetitive = 0x01,
    RepetitiveLowFrameRate = 0x02,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ConnectState {
    Off = 0,
    On = 1,
    Configuring = 2,
    Sampling = 3,
}

impl Default for ConnectState {
    fn default() -> Self {
        ConnectState::Off
    }
}

/// Bits of the pending-configuration mask. Only these four dimensions gate
/// the transition to `ConnectState::Sampling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigBit {
    DataType = 1 << 0,
    ScanPattern = 1 << 1,
    BlindSpot = 1 << 2,
    DualEmit = 1 << 3,
}

/// One independently configurable device setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigDimension {
    DataType,
    ScanPattern,
    BlindSpot,
    DualEmit,
    Attitude,
    ImuData,
    FovCfg0,
    FovCfg1,
    FovEnable,
    WorkMode,
}

impl ConfigDimension {
    pub fn mask_bit(self) -> Option<ConfigBit> {
        match self {
            ConfigDimension::DataType => Some(ConfigBit::DataType),
            ConfigDimension::ScanPattern => Some(ConfigBit::ScanPattern),
            ConfigDimension::BlindSpot => Some(ConfigBit::BlindSpot),
            ConfigDimension::DualEmit => Some(ConfigBit::DualEmit),
            _ => None,
        }
    }

    /// Name used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            ConfigDimension::DataType => "data type",
            ConfigDimension::ScanPattern => "pattern mode",
            ConfigDimension::BlindSpot => "blind spot",
            ConfigDimension::DualEmit => "dual emit mode",
            ConfigDimension::Attitude => "install attitude",
            ConfigDimension::ImuData => "imu data",
            ConfigDimension::FovCfg0 => "fov_cfg0",
            ConfigDimension::FovCfg1 => "fov_cfg1",
            ConfigDimension::FovEnable => "fov enable",
            ConfigDimension::WorkMode => "work mode",
        }
    }
}
