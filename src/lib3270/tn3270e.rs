//! TN3270E (RFC 2355) header and subnegotiation vocabulary
//!
//! Once TN3270E is active every record in either direction starts with a
//! five-byte header: data type, request flag, response flag and a 16-bit
//! sequence number.

use std::fmt;

use super::codes::*;
use crate::error::{ProtocolError, ProtocolResult};

/// TN3270E subnegotiation codes
pub const TN3270E_ASSOCIATE: u8 = 0;
pub const TN3270E_CONNECT: u8 = 1;
pub const TN3270E_DEVICE_TYPE: u8 = 2;
pub const TN3270E_FUNCTIONS: u8 = 3;
pub const TN3270E_IS: u8 = 4;
pub const TN3270E_REASON: u8 = 5;
pub const TN3270E_REJECT: u8 = 6;
pub const TN3270E_REQUEST: u8 = 7;
pub const TN3270E_SEND: u8 = 8;

/// Functions negotiated with FUNCTIONS REQUEST/IS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tn3270eFunction {
    BindImage = 0,
    DataStreamCtl = 1,
    Responses = 2,
    ScsCtlCodes = 3,
    SysReq = 4,
}

impl Tn3270eFunction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::BindImage),
            1 => Some(Self::DataStreamCtl),
            2 => Some(Self::Responses),
            3 => Some(Self::ScsCtlCodes),
            4 => Some(Self::SysReq),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BindImage => "BIND-IMAGE",
            Self::DataStreamCtl => "DATA-STREAM-CTL",
            Self::Responses => "RESPONSES",
            Self::ScsCtlCodes => "SCS-CTL-CODES",
            Self::SysReq => "SYSREQ",
        }
    }

    /// Case-insensitive lookup by RFC name; underscores are accepted for dashes.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.replace('_', "-");
        [
            Self::BindImage,
            Self::DataStreamCtl,
            Self::Responses,
            Self::ScsCtlCodes,
            Self::SysReq,
        ]
        .into_iter()
        .find(|function| function.name().eq_ignore_ascii_case(&wanted))
    }
}

/// Decode a function list, dropping codes we do not know.
pub fn functions_from_bytes(bytes: &[u8]) -> Vec<Tn3270eFunction> {
    bytes.iter().filter_map(|&b| Tn3270eFunction::from_u8(b)).collect()
}

pub fn functions_to_bytes(functions: &[Tn3270eFunction]) -> Vec<u8> {
    functions.iter().map(|&f| f as u8).collect()
}

/// Data type carried in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Data3270,
    ScsData,
    Response,
    BindImage,
    Unbind,
    NvtData,
    Request,
    SscpLuData,
    PrintEoj,
}

impl DataType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            TN3270E_DT_3270_DATA => Some(Self::Data3270),
            TN3270E_DT_SCS_DATA => Some(Self::ScsData),
            TN3270E_DT_RESPONSE => Some(Self::Response),
            TN3270E_DT_BIND_IMAGE => Some(Self::BindImage),
            TN3270E_DT_UNBIND => Some(Self::Unbind),
            TN3270E_DT_NVT_DATA => Some(Self::NvtData),
            TN3270E_DT_REQUEST => Some(Self::Request),
            TN3270E_DT_SSCP_LU_DATA => Some(Self::SscpLuData),
            TN3270E_DT_PRINT_EOJ => Some(Self::PrintEoj),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Data3270 => TN3270E_DT_3270_DATA,
            Self::ScsData => TN3270E_DT_SCS_DATA,
            Self::Response => TN3270E_DT_RESPONSE,
            Self::BindImage => TN3270E_DT_BIND_IMAGE,
            Self::Unbind => TN3270E_DT_UNBIND,
            Self::NvtData => TN3270E_DT_NVT_DATA,
            Self::Request => TN3270E_DT_REQUEST,
            Self::SscpLuData => TN3270E_DT_SSCP_LU_DATA,
            Self::PrintEoj => TN3270E_DT_PRINT_EOJ,
        }
    }
}

/// Outcome reported in a RESPONSE record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Positive,
    /// Negative response with its sense code
    Negative(u8),
}

/// The five-byte TN3270E header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tn3270eHeader {
    pub data_type: DataType,
    pub request_flag: u8,
    pub response_flag: u8,
    pub seq_number: u16,
}

impl Tn3270eHeader {
    pub const LEN: usize = 5;

    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            request_flag: 0,
            response_flag: TN3270E_RSF_NO_RESPONSE,
            seq_number: 0,
        }
    }

    /// Split a record into its header and payload.
    pub fn parse(record: &[u8]) -> ProtocolResult<(Self, &[u8])> {
        if record.len() < Self::LEN {
            return Err(ProtocolError::HeaderMismatch {
                reason: format!("record of {} bytes has no header", record.len()),
            });
        }
        let data_type = DataType::from_u8(record[0]).ok_or_else(|| ProtocolError::HeaderMismatch {
            reason: format!("unknown data type 0x{:02X}", record[0]),
        })?;
        let header = Self {
            data_type,
            request_flag: record[1],
            response_flag: record[2],
            seq_number: u16::from_be_bytes([record[3], record[4]]),
        };
        Ok((header, &record[Self::LEN..]))
    }

    pub fn to_bytes(&self) -> [u8; 5] {
        let [hi, lo] = self.seq_number.to_be_bytes();
        [
            self.data_type.to_u8(),
            self.request_flag,
            self.response_flag,
            hi,
            lo,
        ]
    }

    /// Whether the host wants a RESPONSE record for this one, given how
    /// processing went.
    pub fn wants_response(&self, processed_ok: bool) -> bool {
        match self.response_flag {
            TN3270E_RSF_ALWAYS_RESPONSE => true,
            TN3270E_RSF_ERROR_RESPONSE => !processed_ok,
            _ => false,
        }
    }

    /// Build the RESPONSE record answering this header.
    pub fn response(&self, status: ResponseStatus) -> Vec<u8> {
        let (flag, sense) = match status {
            ResponseStatus::Positive => (TN3270E_RSF_POSITIVE_RESPONSE, TN3270E_POS_DEVICE_END),
            ResponseStatus::Negative(code) => (TN3270E_RSF_NEGATIVE_RESPONSE, code),
        };
        let header = Self {
            data_type: DataType::Response,
            request_flag: 0,
            response_flag: flag,
            seq_number: self.seq_number,
        };
        let mut out = header.to_bytes().to_vec();
        out.push(sense);
        out
    }
}

impl fmt::Display for Tn3270eHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} req=0x{:02X} rsp=0x{:02X} seq={}",
            self.data_type, self.request_flag, self.response_flag, self.seq_number
        )
    }
}

/// Sense code for a negative response to a record that failed to process.
pub fn negative_sense(err: &ProtocolError) -> u8 {
    match err {
        ProtocolError::BadAddress { .. } => TN3270E_NEG_OPERATION_CHECK,
        _ => TN3270E_NEG_COMMAND_REJECT,
    }
}
