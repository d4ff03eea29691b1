//! Wire protocol for the GPU search appliance (client half).
//!
//! Commands travel over a single TCP connection as length-prefixed frames,
//! little-endian throughout, with CRC32 checksums on both headers and
//! payloads.
//!
//! # Request frame
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ command (4B)                             │
//! │ k (4B)                                   │
//! │ API key (8B, space-padded)               │
//! │ body length (8B)                         │
//! │ CRC32 of the 24 bytes above (4B)         │
//! ├──────────────────────────────────────────┤
//! │ body (variable, optional)                │
//! │ CRC32 of body (4B, present iff body is)  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Response frame
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ command (4B)                             │
//! │ status (4B)                              │
//! │ count (4B)                               │
//! │ server elapsed seconds (4B, f32)         │
//! │ body length (8B)                         │
//! │ CRC32 of the 24 bytes above (4B)         │
//! ├──────────────────────────────────────────┤
//! │ body (variable, optional)                │
//! │ CRC32 of body (4B, present iff body is)  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Bodies
//!
//! - [`Command::LoadDatasetFile`]: JSON `{"fileName", "datasetName", "metric"}`.
//! - [`Command::QueryFromFile`]: JSON `{"fileName", "datasetName", "k", "batchSize"}`.
//! - [`Command::Query`]: raw row-major f32 query vectors.
//! - Query responses: `rows (4B)`, `cols (4B)`, `rows*cols` f32 distances,
//!   then `rows*cols` i32 indices.

mod frame;

pub use frame::{pack_results, unpack_results, Request, Response};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size in bytes of both request and response headers.
pub const HEADER_LEN: usize = 28;

/// Fixed API key width on the wire.
pub const API_KEY_LEN: usize = 8;

/// Largest neighbor count the appliance supports per query.
pub const MAX_K: usize = 1024;

/// Command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    /// Load a dataset file on the appliance disk into GPU memory.
    LoadDatasetFile = 0x01,
    /// k-NN search over vectors carried in the request body.
    Query = 0x02,
    /// k-NN search over a query-vector file on the appliance disk.
    QueryFromFile = 0x03,
}

impl TryFrom<u32> for Command {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0x01 => Ok(Command::LoadDatasetFile),
            0x02 => Ok(Command::Query),
            0x03 => Ok(Command::QueryFromFile),
            other => Err(other),
        }
    }
}

/// Status codes returned by the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    Success = 0x00,
    InvalidSequence = 0x01,
    InvalidArgument = 0x02,
    InvalidPacket = 0x03,
    NotSupported = 0x04,
    InvalidCommand = 0x05,
    InvalidData = 0x06,
    Timeout = 0x07,
    InvalidChecksum = 0x08,
    InvalidApiKey = 0x09,
    /// Query vectors do not match the loaded dataset's dimension.
    DifferentVectorLength = 0x10,
    DatasetFileNotFound = 0x20,
    DatasetNotFound = 0x21,
    DatasetSizeNotSupported = 0x22,
    QuerySizeNotSupported = 0x23,
    DistanceModeNotSupported = 0x24,
    QueryModeNotSupported = 0x25,
    ReadCountNotSupported = 0x26,
    UnknownError = 0xFF,
}

impl TryFrom<u32> for Status {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0x00 => Ok(Status::Success),
            0x01 => Ok(Status::InvalidSequence),
            0x02 => Ok(Status::InvalidArgument),
            0x03 => Ok(Status::InvalidPacket),
            0x04 => Ok(Status::NotSupported),
            0x05 => Ok(Status::InvalidCommand),
            0x06 => Ok(Status::InvalidData),
            0x07 => Ok(Status::Timeout),
            0x08 => Ok(Status::InvalidChecksum),
            0x09 => Ok(Status::InvalidApiKey),
            0x10 => Ok(Status::DifferentVectorLength),
            0x20 => Ok(Status::DatasetFileNotFound),
            0x21 => Ok(Status::DatasetNotFound),
            0x22 => Ok(Status::DatasetSizeNotSupported),
            0x23 => Ok(Status::QuerySizeNotSupported),
            0x24 => Ok(Status::DistanceModeNotSupported),
            0x25 => Ok(Status::QueryModeNotSupported),
            0x26 => Ok(Status::ReadCountNotSupported),
            0xFF => Ok(Status::UnknownError),
            other => Err(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Status::Success => "success",
            Status::InvalidSequence => "invalid command sequence",
            Status::InvalidArgument => "invalid argument",
            Status::InvalidPacket => "invalid packet",
            Status::NotSupported => "operation not supported",
            Status::InvalidCommand => "invalid command",
            Status::InvalidData => "invalid data",
            Status::Timeout => "timeout",
            Status::InvalidChecksum => "invalid checksum",
            Status::InvalidApiKey => "invalid API key",
            Status::DifferentVectorLength => "query vector length does not match dataset",
            Status::DatasetFileNotFound => "dataset file not found",
            Status::DatasetNotFound => "dataset not found in file",
            Status::DatasetSizeNotSupported => "dataset size not supported",
            Status::QuerySizeNotSupported => "query size not supported",
            Status::DistanceModeNotSupported => "distance mode not supported",
            Status::QueryModeNotSupported => "query mode not supported",
            Status::ReadCountNotSupported => "read count not supported",
            Status::UnknownError => "unknown error",
        };
        write!(f, "{msg}")
    }
}

/// Distance metric for a loaded dataset.
///
/// `L2` is the squared Euclidean distance, which yields the same neighbor
/// ranking as true L2. `Ip` is the inner product, used for cosine similarity;
/// both dataset and query vectors should be L2-normalized first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Metric {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// Inner product (maximum inner product search).
    Ip,
}

impl Metric {
    /// Wire name of the metric.
    #[must_use]
    pub fn as_wire(self) -> &'static str {
        match self {
            Metric::L2 => "L2",
            Metric::Ip => "IP",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "L2" | "l2" => Ok(Metric::L2),
            "IP" | "ip" => Ok(Metric::Ip),
            other => Err(format!("unknown metric '{other}' (expected L2 or IP)")),
        }
    }
}

/// Body of a [`Command::LoadDatasetFile`] request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadDatasetBody {
    /// Path of the dataset file on the appliance disk.
    pub file_name: String,
    /// Dataset name within the file (HDF5 only; ignored otherwise).
    pub dataset_name: String,
    /// Wire name of the distance metric.
    pub metric: String,
}

/// Body of a [`Command::QueryFromFile`] request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFromFileBody {
    /// Path of the query-vector file on the appliance disk.
    pub file_name: String,
    /// Dataset name within the file (HDF5 only; ignored otherwise).
    pub dataset_name: String,
    /// Neighbors to return per query.
    pub k: u32,
    /// Server-side batch size.
    pub batch_size: u32,
}

/// Pad or truncate an API key to its fixed wire width.
#[must_use]
pub fn pad_api_key(key: &str) -> [u8; API_KEY_LEN] {
    let mut out = [b' '; API_KEY_LEN];
    let bytes = key.as_bytes();
    let n = bytes.len().min(API_KEY_LEN);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_roundtrip() {
        for cmd in [Command::LoadDatasetFile, Command::Query, Command::QueryFromFile] {
            assert_eq!(Command::try_from(cmd as u32), Ok(cmd));
        }
        assert_eq!(Command::try_from(0x42), Err(0x42));
    }

    #[test]
    fn status_roundtrip() {
        assert_eq!(Status::try_from(0x00), Ok(Status::Success));
        assert_eq!(Status::try_from(0x10), Ok(Status::DifferentVectorLength));
        assert_eq!(Status::try_from(0xFF), Ok(Status::UnknownError));
        // 0x0A..0x0F are unassigned
        assert_eq!(Status::try_from(0x0A), Err(0x0A));
    }

    #[test]
    fn api_key_padding() {
        assert_eq!(&pad_api_key("abc"), b"abc     ");
        assert_eq!(&pad_api_key("exactly8"), b"exactly8");
        assert_eq!(&pad_api_key("morethan8chars"), b"morethan");
        assert_eq!(&pad_api_key(""), b"        ");
    }

    #[test]
    fn metric_wire_names() {
        assert_eq!(Metric::L2.as_wire(), "L2");
        assert_eq!(Metric::Ip.as_wire(), "IP");
        assert_eq!("IP".parse::<Metric>().unwrap(), Metric::Ip);
        assert!("cosine".parse::<Metric>().is_err());
    }

    #[test]
    fn load_body_wire_keys() {
        let body = LoadDatasetBody {
            file_name: "/data/wiki.h5".to_string(),
            dataset_name: "lsi".to_string(),
            metric: Metric::L2.as_wire().to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["fileName"], "/data/wiki.h5");
        assert_eq!(json["datasetName"], "lsi");
        assert_eq!(json["metric"], "L2");
    }

    #[test]
    fn query_from_file_body_wire_keys() {
        let body = QueryFromFileBody {
            file_name: "/data/wiki.h5".to_string(),
            dataset_name: "lsi".to_string(),
            k: 11,
            batch_size: 1024,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["k"], 11);
        assert_eq!(json["batchSize"], 1024);
    }
}
