//! Local vector dataset files.
//!
//! Two input formats:
//!
//! - Flat binary (`.vec`): magic `VEC1`, row count (4B), dimension (4B),
//!   then row-major f32 data. Always available, and what the demos ship.
//! - HDF5 (`.h5` / `.hdf5`): a named 2-D f32 dataset, read with the `hdf5`
//!   crate behind the `hdf5` cargo feature. Without the feature, HDF5 paths
//!   fail with a clear error instead of a silent misread.
//!
//! [`load_vectors`] dispatches on the file extension.

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic bytes for flat binary vector files.
pub const VECTOR_MAGIC: &[u8; 4] = b"VEC1";

/// Read a flat binary vector file.
pub fn read_vector_file<P: AsRef<Path>>(path: P) -> Result<Matrix<f32>> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != VECTOR_MAGIC {
        return Err(Error::Format(format!(
            "not a vector file (magic {magic:02x?})"
        )));
    }

    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    let n = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let d = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let bytes = n
        .checked_mul(d)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::Format("vector file shape overflow".into()))?;
    let mut data = vec![0u8; bytes];
    reader.read_exact(&mut data)?;
    Matrix::from_le_bytes(n, d, &data)
}

/// Write a flat binary vector file.
pub fn write_vector_file<P: AsRef<Path>>(path: P, vectors: &Matrix<f32>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(VECTOR_MAGIC)?;
    writer.write_all(&(vectors.rows() as u32).to_le_bytes())?;
    writer.write_all(&(vectors.cols() as u32).to_le_bytes())?;
    writer.write_all(&vectors.to_le_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read a named 2-D f32 dataset from an HDF5 file.
#[cfg(feature = "hdf5")]
pub fn read_hdf5<P: AsRef<Path>>(path: P, dataset_name: &str) -> Result<Matrix<f32>> {
    let file = hdf5::File::open(path)?;
    let dataset = file.dataset(dataset_name)?;
    let data: ndarray::Array2<f32> = dataset.read_2d()?;
    let (rows, cols) = data.dim();
    // Array2 from hdf5 reads are standard (row-major) layout.
    Matrix::new(rows, cols, data.into_raw_vec())
}

/// Load query vectors from a local file, dispatching on the extension.
///
/// `dataset_name` selects the dataset within an HDF5 file and is ignored for
/// flat vector files.
pub fn load_vectors<P: AsRef<Path>>(path: P, dataset_name: &str) -> Result<Matrix<f32>> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("vec") | Some("bin") => read_vector_file(path),
        Some("h5") | Some("hdf5") => {
            #[cfg(feature = "hdf5")]
            {
                read_hdf5(path, dataset_name)
            }
            #[cfg(not(feature = "hdf5"))]
            {
                let _ = dataset_name;
                Err(Error::Unsupported(
                    "HDF5 input requires the 'hdf5' feature (cargo build --features hdf5)".into(),
                ))
            }
        }
        other => Err(Error::Unsupported(format!(
            "vector file extension {other:?} (expected .vec or .h5)"
        ))),
    }
}

/// Seeded synthetic datasets for demos, benches and tests.
pub mod synthetic {
    use crate::matrix::Matrix;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Vectors uniformly distributed in `[0, 1]^d`.
    #[must_use]
    pub fn uniform(n: usize, dim: usize, seed: u64) -> Matrix<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<f32> = (0..n * dim).map(|_| rng.random::<f32>()).collect();
        Matrix::new(n, dim, data).expect("generated data matches shape")
    }

    /// Vectors sampled around `n_clusters` random centers with Gaussian
    /// noise, clamped to `[0, 1]`.
    #[must_use]
    pub fn clustered(
        n: usize,
        dim: usize,
        n_clusters: usize,
        cluster_std: f32,
        seed: u64,
    ) -> Matrix<f32> {
        let mut rng = StdRng::seed_from_u64(seed);

        let centers: Vec<Vec<f32>> = (0..n_clusters)
            .map(|_| (0..dim).map(|_| rng.random::<f32>()).collect())
            .collect();

        let mut data = Vec::with_capacity(n * dim);
        for _ in 0..n {
            let center = &centers[rng.random_range(0..n_clusters)];
            for &c in center {
                // Box-Muller for Gaussian noise
                let u1: f32 = rng.random();
                let u2: f32 = rng.random();
                let z = (-2.0 * u1.max(1e-12).ln()).sqrt()
                    * (2.0 * std::f32::consts::PI * u2).cos();
                data.push((c + z * cluster_std).clamp(0.0, 1.0));
            }
        }
        Matrix::new(n, dim, data).expect("generated data matches shape")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.vec");

        let vectors = synthetic::uniform(10, 8, 42);
        write_vector_file(&path, &vectors).unwrap();
        let restored = read_vector_file(&path).unwrap();
        assert_eq!(restored, vectors);
    }

    #[test]
    fn wrong_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.vec");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00\x01\x00\x00\x00").unwrap();
        assert!(matches!(read_vector_file(&path), Err(Error::Format(_))));
    }

    #[test]
    fn truncated_data_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.vec");

        let vectors = synthetic::uniform(4, 4, 1);
        write_vector_file(&path, &vectors).unwrap();
        let full = std::fs::read(&path).unwrap();
        std::fs::write(&path, &full[..full.len() - 8]).unwrap();
        assert!(matches!(read_vector_file(&path), Err(Error::Io(_))));
    }

    #[test]
    fn extension_dispatch() {
        assert!(matches!(
            load_vectors("queries.npy", ""),
            Err(Error::Unsupported(_))
        ));
        #[cfg(not(feature = "hdf5"))]
        assert!(matches!(
            load_vectors("queries.h5", "lsi"),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn synthetic_shapes_and_range() {
        let m = synthetic::clustered(100, 16, 5, 0.1, 7);
        assert_eq!(m.rows(), 100);
        assert_eq!(m.cols(), 16);
        assert!(m.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn synthetic_is_deterministic() {
        assert_eq!(synthetic::uniform(5, 3, 9), synthetic::uniform(5, 3, 9));
    }
}
