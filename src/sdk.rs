//! Seam to the vendor SDK.
//!
//! The SDK owns the transport and its worker threads. Every request handed to
//! it completes exactly once, on a thread of the SDK's choosing, by invoking
//! the handler passed along with the request.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::config::{FovCfg, InstallAttitude};
use crate::enums::{ConfigDimension, LivoxStatus, PointDataType, ScanPattern, WorkMode};
use crate::error::DecodeError;

/// Acknowledgement payload of a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncControlResponse {
    pub ret_code: u8,
    pub error_key: u16,
}

impl AsyncControlResponse {
    pub const SIZE: usize = 3;

    pub fn from_bytes(data: &[u8]) -> Option<AsyncControlResponse> {
        let mut rdr = Cursor::new(data);
        let ret_code = rdr.read_u8().ok()?;
        let error_key = rdr.read_u16::<LittleEndian>().ok()?;
        Some(AsyncControlResponse { ret_code, error_key })
    }
}

/// Diagnostic internal-info payload: a header followed by TLV records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagInternalInfoResponse {
    pub ret_code: u8,
    pub param_num: u16,
    /// Record area, running to the end of the response.
    pub data: Vec<u8>,
}

impl DiagInternalInfoResponse {
    pub const HEADER_SIZE: usize = 3;

    pub fn from_bytes(data: &[u8]) -> Result<DiagInternalInfoResponse, DecodeError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(DecodeError::ResponseTooShort(data.len()));
        }
        let mut rdr = Cursor::new(data);
        let ret_code = rdr.read_u8().map_err(|_| DecodeError::ResponseTooShort(data.len()))?;
        let param_num = rdr
            .read_u16::<LittleEndian>()
            .map_err(|_| DecodeError::ResponseTooShort(data.len()))?;
        Ok(DiagInternalInfoResponse {
            ret_code,
            param_num,
            data: data[Self::HEADER_SIZE..].to_vec(),
        })
    }
}

/// Static information the SDK reports when a lidar appears or changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LidarInfo {
    pub dev_type: u8,
    pub sn: String,
    pub lidar_ip: String,
}

/// A single "set" request, carrying the target value for its dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetRequest {
    PclDataType(PointDataType),
    ScanPattern(ScanPattern),
    BlindSpot(u32),
    DualEmit(bool),
    FovCfg0(FovCfg),
    FovCfg1(FovCfg),
    EnableFov(u8),
    InstallAttitude(InstallAttitude),
    WorkMode(WorkMode),
    EnableImuData,
}

impl SetRequest {
    pub fn dimension(&self) -> ConfigDimension {
        match self {
            SetRequest::PclDataType(_) => ConfigDimension::DataType,
            SetRequest::ScanPattern(_) => ConfigDimension::ScanPattern,
            SetRequest::BlindSpot(_) => ConfigDimension::BlindSpot,
            SetRequest::DualEmit(_) => ConfigDimension::DualEmit,
            SetRequest::FovCfg0(_) => ConfigDimension::FovCfg0,
            SetRequest::FovCfg1(_) => ConfigDimension::FovCfg1,
            SetRequest::EnableFov(_) => ConfigDimension::FovEnable,
            SetRequest::InstallAttitude(_) => ConfigDimension::Attitude,
            SetRequest::WorkMode(_) => ConfigDimension::WorkMode,
            SetRequest::EnableImuData => ConfigDimension::ImuData,
        }
    }
}

pub type ControlHandler = Box<dyn FnOnce(LivoxStatus, u32, Option<AsyncControlResponse>) + Send>;
pub type InternalInfoHandler =
    Box<dyn FnOnce(LivoxStatus, u32, Option<DiagInternalInfoResponse>) + Send>;

/// Asynchronous operations the vendor SDK exposes to the driver.
pub trait LidarSdk: Send + Sync {
    fn set_parameter(&self, handle: u32, request: SetRequest, on_complete: ControlHandler);

    fn query_internal_info(&self, handle: u32, on_complete: InternalInfoHandler);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_response() {
        let resp = AsyncControlResponse::from_bytes(&[0x02, 0x13, 0x00]).unwrap();
        assert_eq!(resp, AsyncControlResponse { ret_code: 2, error_key: 0x0013 });
        assert!(AsyncControlResponse::from_bytes(&[0x02, 0x13]).is_none());
    }

    #[test]
    fn test_internal_info_header() {
        let resp = DiagInternalInfoResponse::from_bytes(&[0x00, 0x02, 0x00, 0xAA]).unwrap();
        assert_eq!(resp.ret_code, 0);
        assert_eq!(resp.param_num, 2);
        assert_eq!(resp.data, vec![0xAA]);
        assert_eq!(
            DiagInternalInfoResponse::from_bytes(&[0x00, 0x01]),
            Err(DecodeError::ResponseTooShort(2))
        );
    }
}
