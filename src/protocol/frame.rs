//! Frame encoding and decoding.
//!
//! Both directions are implemented: the client sends requests and reads
//! responses, while tests drive a mock appliance that reads requests and
//! sends responses over the same codec.

use crate::error::{Error, Result};
use crate::matrix::{Matrix, QueryResults};
use crate::protocol::{pad_api_key, Command, Status, API_KEY_LEN, HEADER_LEN};
use serde::Serialize;
use std::io::{Read, Write};
use std::time::Duration;

fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

fn read_u64(buf: &[u8]) -> u64 {
    u64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Verify a transmitted CRC32 against the checksum of `data`.
fn check_crc(declared: u32, data: &[u8]) -> Result<()> {
    let actual = crc32fast::hash(data);
    if declared != actual {
        return Err(Error::ChecksumMismatch {
            expected: declared,
            actual,
        });
    }
    Ok(())
}

/// Read a body of `len` bytes followed by its CRC32 trailer.
fn read_body<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let len = usize::try_from(len).map_err(|_| Error::Format("body length overflow".into()))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    let mut crc = [0u8; 4];
    reader.read_exact(&mut crc)?;
    check_crc(u32::from_le_bytes(crc), &body)?;
    Ok(body)
}

/// A request frame.
#[derive(Debug, Clone)]
pub struct Request {
    pub command: Command,
    pub k: u32,
    pub api_key: [u8; API_KEY_LEN],
    pub body: Vec<u8>,
}

impl Request {
    /// Create a request with no body and `k = 0`.
    pub fn new(command: Command, api_key: &str) -> Self {
        Self {
            command,
            k: 0,
            api_key: pad_api_key(api_key),
            body: Vec::new(),
        }
    }

    /// Set the neighbor count.
    #[must_use]
    pub fn with_k(mut self, k: u32) -> Self {
        self.k = k;
        self
    }

    /// Attach a JSON body.
    pub fn with_json<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.body = serde_json::to_vec(payload)?;
        Ok(self)
    }

    /// Attach raw row-major query vectors as the body.
    #[must_use]
    pub fn with_vectors(mut self, vectors: &Matrix<f32>) -> Self {
        self.body = vectors.to_le_bytes();
        self
    }

    /// Parse the body as JSON.
    pub fn json<'a, T: serde::Deserialize<'a>>(&'a self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Encode the full frame (header, body, checksums).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.body.len() + 4);
        buf.extend_from_slice(&(self.command as u32).to_le_bytes());
        buf.extend_from_slice(&self.k.to_le_bytes());
        buf.extend_from_slice(&self.api_key);
        buf.extend_from_slice(&(self.body.len() as u64).to_le_bytes());
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        if !self.body.is_empty() {
            buf.extend_from_slice(&self.body);
            buf.extend_from_slice(&crc32fast::hash(&self.body).to_le_bytes());
        }
        buf
    }

    /// Write the full frame to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        writer.flush()?;
        Ok(())
    }

    /// Read and validate a request frame.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;
        check_crc(read_u32(&header[24..28]), &header[..24])?;

        let command = Command::try_from(read_u32(&header[0..4]))
            .map_err(|raw| Error::Format(format!("unknown command {raw:#04x}")))?;
        let k = read_u32(&header[4..8]);
        let mut api_key = [0u8; API_KEY_LEN];
        api_key.copy_from_slice(&header[8..16]);
        let body_len = read_u64(&header[16..24]);

        let body = if body_len > 0 {
            read_body(reader, body_len)?
        } else {
            Vec::new()
        };
        Ok(Self {
            command,
            k,
            api_key,
            body,
        })
    }
}

/// A response frame.
#[derive(Debug, Clone)]
pub struct Response {
    pub command: Command,
    pub status: Status,
    /// Result count reported by the appliance (carried, unused by clients).
    pub count: u32,
    /// Time spent on the appliance, in seconds.
    pub elapsed_secs: f32,
    pub body: Vec<u8>,
}

impl Response {
    /// Create a success response with no body.
    pub fn ok(command: Command) -> Self {
        Self {
            command,
            status: Status::Success,
            count: 0,
            elapsed_secs: 0.0,
            body: Vec::new(),
        }
    }

    /// Create an error response.
    pub fn error(command: Command, status: Status) -> Self {
        Self {
            command,
            status,
            count: 0,
            elapsed_secs: 0.0,
            body: Vec::new(),
        }
    }

    /// Server-side elapsed time as a [`Duration`].
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.elapsed_secs.max(0.0)))
    }

    /// Encode the full frame (header, body, checksums).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.body.len() + 4);
        buf.extend_from_slice(&(self.command as u32).to_le_bytes());
        buf.extend_from_slice(&(self.status as u32).to_le_bytes());
        buf.extend_from_slice(&self.count.to_le_bytes());
        buf.extend_from_slice(&self.elapsed_secs.to_le_bytes());
        buf.extend_from_slice(&(self.body.len() as u64).to_le_bytes());
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        if !self.body.is_empty() {
            buf.extend_from_slice(&self.body);
            buf.extend_from_slice(&crc32fast::hash(&self.body).to_le_bytes());
        }
        buf
    }

    /// Write the full frame to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        writer.flush()?;
        Ok(())
    }

    /// Read and validate a response frame.
    ///
    /// The status is decoded but not acted upon; callers decide how to treat
    /// non-success responses.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;
        check_crc(read_u32(&header[24..28]), &header[..24])?;

        let command = Command::try_from(read_u32(&header[0..4]))
            .map_err(|raw| Error::Format(format!("unknown command {raw:#04x}")))?;
        let status = Status::try_from(read_u32(&header[4..8]))
            .map_err(|raw| Error::Format(format!("unknown status {raw:#04x}")))?;
        let count = read_u32(&header[8..12]);
        let elapsed_secs = f32::from_le_bytes([header[12], header[13], header[14], header[15]]);
        let body_len = read_u64(&header[16..24]);

        let body = if body_len > 0 {
            read_body(reader, body_len)?
        } else {
            Vec::new()
        };
        Ok(Self {
            command,
            status,
            count,
            elapsed_secs,
            body,
        })
    }
}

/// Encode query results as a response body.
///
/// Layout: `rows (4B)`, `cols (4B)`, distances, indices.
#[must_use]
pub fn pack_results(results: &QueryResults) -> Vec<u8> {
    let rows = results.num_queries();
    let cols = results.k();
    let mut buf = Vec::with_capacity(8 + rows * cols * 8);
    buf.extend_from_slice(&(rows as u32).to_le_bytes());
    buf.extend_from_slice(&(cols as u32).to_le_bytes());
    buf.extend_from_slice(&results.distances.to_le_bytes());
    buf.extend_from_slice(&results.indices.to_le_bytes());
    buf
}

/// Decode query results from a response body.
pub fn unpack_results(body: &[u8]) -> Result<QueryResults> {
    if body.len() < 8 {
        return Err(Error::Format(format!(
            "result body too short: {} bytes",
            body.len()
        )));
    }
    let rows = read_u32(&body[0..4]) as usize;
    let cols = read_u32(&body[4..8]) as usize;
    let n = rows
        .checked_mul(cols)
        .ok_or_else(|| Error::Format("result shape overflow".into()))?;
    let matrix_bytes = n
        .checked_mul(4)
        .ok_or_else(|| Error::Format("result shape overflow".into()))?;
    let expected = 8 + 2 * matrix_bytes;
    if body.len() != expected {
        return Err(Error::Format(format!(
            "result body length {} does not match {rows}x{cols} shape (expected {expected})",
            body.len()
        )));
    }

    let distances = Matrix::<f32>::from_le_bytes(rows, cols, &body[8..8 + matrix_bytes])?;
    let indices = Matrix::<i32>::from_le_bytes(rows, cols, &body[8 + matrix_bytes..])?;
    QueryResults::new(distances, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LoadDatasetBody;
    use std::io::Cursor;

    fn sample_results() -> QueryResults {
        let distances = Matrix::from_rows(&[vec![0.0, 1.5], vec![0.25, 2.0]]).unwrap();
        let indices = Matrix::from_rows(&[vec![7, 3], vec![1, 9]]).unwrap();
        QueryResults::new(distances, indices).unwrap()
    }

    #[test]
    fn request_roundtrip_with_json_body() {
        let req = Request::new(Command::LoadDatasetFile, "key")
            .with_json(&LoadDatasetBody {
                file_name: "/data/wiki.h5".to_string(),
                dataset_name: "lsi".to_string(),
                metric: "L2".to_string(),
            })
            .unwrap();

        let bytes = req.encode();
        let parsed = Request::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed.command, Command::LoadDatasetFile);
        assert_eq!(&parsed.api_key, b"key     ");
        let body: LoadDatasetBody = parsed.json().unwrap();
        assert_eq!(body.file_name, "/data/wiki.h5");
    }

    #[test]
    fn request_roundtrip_with_vectors() {
        let vectors = Matrix::from_rows(&[vec![1.0f32, 2.0, 3.0]]).unwrap();
        let req = Request::new(Command::Query, "key")
            .with_k(5)
            .with_vectors(&vectors);

        let bytes = req.encode();
        let parsed = Request::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed.k, 5);
        assert_eq!(parsed.body.len(), 12);
        let restored = Matrix::<f32>::from_le_bytes(1, 3, &parsed.body).unwrap();
        assert_eq!(restored.row(0), Some(&[1.0f32, 2.0, 3.0][..]));
    }

    #[test]
    fn response_roundtrip_with_results() {
        let mut resp = Response::ok(Command::Query);
        resp.elapsed_secs = 0.125;
        resp.body = pack_results(&sample_results());

        let bytes = resp.encode();
        let parsed = Response::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed.status, Status::Success);
        assert_eq!(parsed.elapsed(), Duration::from_millis(125));

        let results = unpack_results(&parsed.body).unwrap();
        assert_eq!(results.num_queries(), 2);
        assert_eq!(results.k(), 2);
        assert_eq!(results.indices.row(1), Some(&[1, 9][..]));
    }

    #[test]
    fn corrupt_header_checksum_rejected() {
        let mut bytes = Request::new(Command::Query, "key").with_k(3).encode();
        bytes[4] ^= 0x01; // flip a bit in k
        let err = Request::read_from(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn corrupt_body_checksum_rejected() {
        let vectors = Matrix::from_rows(&[vec![1.0f32, 2.0]]).unwrap();
        let mut bytes = Request::new(Command::Query, "key")
            .with_k(1)
            .with_vectors(&vectors)
            .encode();
        let last = bytes.len() - 5; // inside the body, before its CRC
        bytes[last] ^= 0xFF;
        let err = Request::read_from(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn truncated_stream_is_io_error() {
        let bytes = Response::ok(Command::Query).encode();
        let err = Response::read_from(&mut Cursor::new(&bytes[..10])).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn unknown_status_rejected() {
        let mut resp = Response::ok(Command::Query);
        resp.status = Status::Success;
        let mut bytes = resp.encode();
        // Rewrite the status field and fix up the header CRC.
        bytes[4..8].copy_from_slice(&0x0Bu32.to_le_bytes());
        let crc = crc32fast::hash(&bytes[..24]);
        bytes[24..28].copy_from_slice(&crc.to_le_bytes());
        let err = Response::read_from(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn result_body_shape_must_match_length() {
        let mut body = pack_results(&sample_results());
        body.truncate(body.len() - 4);
        assert!(matches!(unpack_results(&body), Err(Error::Format(_))));
    }
}
