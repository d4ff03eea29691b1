//! Row-major matrices for query vectors and search results.
//!
//! The appliance exchanges dense row-major data: f32 query vectors out,
//! f32 distances and i32 indices back. [`Matrix`] is the minimal owned
//! container for those, with the little-endian byte conversions the wire
//! needs.

use crate::error::{Error, Result};

/// Element types that can cross the wire.
pub trait Scalar: Copy + Default {
    /// Size of one element in bytes.
    const BYTES: usize;

    /// Append the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode one element from a `BYTES`-long little-endian slice.
    fn read_le(bytes: &[u8]) -> Self;
}

impl Scalar for f32 {
    const BYTES: usize = 4;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Scalar for i32 {
    const BYTES: usize = 4;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// An owned row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Scalar> Matrix<T> {
    /// Create a matrix from flat row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        let expected = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::Format("matrix shape overflow".into()))?;
        if data.len() != expected {
            return Err(Error::Format(format!(
                "matrix data length {} does not match {rows}x{cols} shape",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Create a matrix from a slice of equal-length rows.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(Error::DimensionMismatch {
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Create a one-row matrix from a single vector.
    #[must_use]
    pub fn from_row(row: &[T]) -> Self {
        Self {
            rows: 1,
            cols: row.len(),
            data: row.to_vec(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whether the matrix has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Borrow row `i`, or `None` when out of range.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[T]> {
        if i >= self.rows {
            return None;
        }
        Some(&self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Flat row-major data.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Copy out rows `start..end` as a new matrix.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.rows {
            return Err(Error::InvalidParameter(format!(
                "row range {start}..{end} out of bounds for {} rows",
                self.rows
            )));
        }
        Ok(Self {
            rows: end - start,
            cols: self.cols,
            data: self.data[start * self.cols..end * self.cols].to_vec(),
        })
    }

    /// Append all rows of `other` below `self`.
    pub fn vstack(&mut self, other: &Self) -> Result<()> {
        if self.cols != other.cols {
            return Err(Error::DimensionMismatch {
                expected: self.cols,
                actual: other.cols,
            });
        }
        self.data.extend_from_slice(&other.data);
        self.rows += other.rows;
        Ok(())
    }

    /// Encode the data section as little-endian bytes, row-major.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * T::BYTES);
        for &v in &self.data {
            v.write_le(&mut out);
        }
        out
    }

    /// Decode a `rows x cols` matrix from little-endian bytes.
    pub fn from_le_bytes(rows: usize, cols: usize, bytes: &[u8]) -> Result<Self> {
        let n = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::Format("matrix shape overflow".into()))?;
        if bytes.len() != n * T::BYTES {
            return Err(Error::Format(format!(
                "byte length {} does not match {rows}x{cols} matrix",
                bytes.len()
            )));
        }
        let data = bytes.chunks_exact(T::BYTES).map(T::read_le).collect();
        Ok(Self { rows, cols, data })
    }
}

impl Matrix<f32> {
    /// L2-normalize every row in place.
    ///
    /// Zero rows are left untouched. Required before querying an `IP`-metric
    /// dataset with cosine semantics.
    pub fn normalize_rows(&mut self) {
        for row in self.data.chunks_exact_mut(self.cols.max(1)) {
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 1e-10 {
                for v in row.iter_mut() {
                    *v /= norm;
                }
            }
        }
    }
}

/// One neighbor of a query vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row index of the neighbor in the loaded dataset.
    pub index: i32,
    /// Distance from the query under the dataset's metric.
    pub distance: f32,
}

/// Distances and indices returned by a k-NN query, one row per query vector
/// and one column per neighbor.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults {
    pub distances: Matrix<f32>,
    pub indices: Matrix<i32>,
}

impl QueryResults {
    /// Pair up distance and index matrices; shapes must agree.
    pub fn new(distances: Matrix<f32>, indices: Matrix<i32>) -> Result<Self> {
        if distances.rows() != indices.rows() || distances.cols() != indices.cols() {
            return Err(Error::Format(format!(
                "result shape mismatch: distances {}x{}, indices {}x{}",
                distances.rows(),
                distances.cols(),
                indices.rows(),
                indices.cols()
            )));
        }
        Ok(Self { distances, indices })
    }

    /// Number of query vectors covered.
    #[must_use]
    pub fn num_queries(&self) -> usize {
        self.distances.rows()
    }

    /// Neighbors returned per query.
    #[must_use]
    pub fn k(&self) -> usize {
        self.distances.cols()
    }

    /// Neighbors of query `i`, nearest first, or `None` when out of range.
    #[must_use]
    pub fn neighbors(&self, i: usize) -> Option<Vec<Neighbor>> {
        let distances = self.distances.row(i)?;
        let indices = self.indices.row(i)?;
        Some(
            indices
                .iter()
                .zip(distances)
                .map(|(&index, &distance)| Neighbor { index, distance })
                .collect(),
        )
    }

    /// Append the results of a later batch.
    pub fn append(&mut self, other: &QueryResults) -> Result<()> {
        self.distances.vstack(&other.distances)?;
        self.indices.vstack(&other.indices)
    }
}
