//! Local cached k-NN adjacency table.
//!
//! Building a full neighbor graph of a large dataset takes minutes of GPU
//! time; looking one row up takes microseconds. [`NeighborGraph`] holds the
//! result of querying a dataset against itself and persists it to a single
//! checksummed file so later lookups never touch the network.
//!
//! # File layout
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │ Magic bytes (4B): "KNNG"            │
//! ├─────────────────────────────────────┤
//! │ Format version (4B)                 │
//! │ Row count (4B)                      │
//! │ Neighbors per row (4B)              │
//! ├─────────────────────────────────────┤
//! │ Distances (rows * k * 4B, f32)      │
//! │ Indices (rows * k * 4B, i32)        │
//! ├─────────────────────────────────────┤
//! │ CRC32 of everything after magic (4B)│
//! └─────────────────────────────────────┘
//! ```

use crate::error::{Error, Result};
use crate::matrix::{Matrix, Neighbor, QueryResults};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic bytes for neighbor-graph cache files.
pub const GRAPH_MAGIC: &[u8; 4] = b"KNNG";

/// Current cache file format version.
pub const GRAPH_VERSION: u32 = 1;

/// A precomputed k-NN table: for every dataset row, its `k` nearest
/// neighbors with distances, nearest first.
///
/// When the table was built by querying a dataset against itself, the
/// nearest neighbor of each row is usually the row itself; callers skip it
/// at display time.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborGraph {
    distances: Matrix<f32>,
    indices: Matrix<i32>,
}

impl NeighborGraph {
    /// Build a graph from query results covering every row of a dataset.
    pub fn from_results(results: QueryResults) -> Self {
        Self {
            distances: results.distances,
            indices: results.indices,
        }
    }

    /// Number of rows covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.distances.rows()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbors stored per row.
    #[must_use]
    pub fn k(&self) -> usize {
        self.distances.cols()
    }

    /// Neighbors of row `id`, nearest first.
    pub fn neighbors(&self, id: usize) -> Result<Vec<Neighbor>> {
        let distances = self
            .distances
            .row(id)
            .ok_or_else(|| Error::NotFound(format!("row {id} (graph has {} rows)", self.len())))?;
        let indices = self.indices.row(id).expect("matrices share shape");
        Ok(indices
            .iter()
            .zip(distances)
            .map(|(&index, &distance)| Neighbor { index, distance })
            .collect())
    }

    /// Write the graph to a cache file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut payload = Vec::with_capacity(12 + self.len() * self.k() * 8);
        payload.extend_from_slice(&GRAPH_VERSION.to_le_bytes());
        payload.extend_from_slice(&(self.len() as u32).to_le_bytes());
        payload.extend_from_slice(&(self.k() as u32).to_le_bytes());
        payload.extend_from_slice(&self.distances.to_le_bytes());
        payload.extend_from_slice(&self.indices.to_le_bytes());

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(GRAPH_MAGIC)?;
        writer.write_all(&payload)?;
        writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Read a graph back from a cache file, verifying magic, version and
    /// checksum.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != GRAPH_MAGIC {
            return Err(Error::Format(format!(
                "not a neighbor graph file (magic {magic:02x?})"
            )));
        }

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest)?;
        if rest.len() < 16 {
            return Err(Error::Format("truncated neighbor graph file".into()));
        }
        let (payload, crc_bytes) = rest.split_at(rest.len() - 4);
        let declared = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = crc32fast::hash(payload);
        if declared != actual {
            return Err(Error::ChecksumMismatch {
                expected: declared,
                actual,
            });
        }

        let version = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        if version != GRAPH_VERSION {
            return Err(Error::Format(format!(
                "unsupported neighbor graph version {version}"
            )));
        }
        let rows = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as usize;
        let k = u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]) as usize;

        let n = rows
            .checked_mul(k)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::Format("neighbor graph shape overflow".into()))?;
        let data = &payload[12..];
        if data.len() != 2 * n {
            return Err(Error::Format(format!(
                "neighbor graph data length {} does not match {rows}x{k} shape",
                data.len()
            )));
        }

        Ok(Self {
            distances: Matrix::from_le_bytes(rows, k, &data[..n])?,
            indices: Matrix::from_le_bytes(rows, k, &data[n..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> NeighborGraph {
        let distances = Matrix::from_rows(&[vec![0.0f32, 0.5, 0.9], vec![0.0, 0.3, 1.2]]).unwrap();
        let indices = Matrix::from_rows(&[vec![0, 1, 5], vec![1, 4, 2]]).unwrap();
        NeighborGraph::from_results(QueryResults::new(distances, indices).unwrap())
    }

    #[test]
    fn neighbor_lookup() {
        let graph = sample_graph();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.k(), 3);

        let neighbors = graph.neighbors(1).unwrap();
        assert_eq!(neighbors[0].index, 1); // self-match
        assert_eq!(neighbors[1].index, 4);
        assert!((neighbors[1].distance - 0.3).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_row_is_not_found() {
        let err = sample_graph().neighbors(2).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
