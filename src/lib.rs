//! juxta: client for a remote GPU k-NN search appliance.
//!
//! The appliance holds datasets of dense float vectors in GPU memory and
//! answers k-nearest-neighbor queries over a framed TCP protocol. This crate
//! implements the client side of that protocol plus the local plumbing a
//! search workflow needs:
//!
//! - `protocol/`: the wire format (commands, status codes, checksummed frames)
//! - `client`: connection handling, batched queries, timing breakdown
//! - `matrix`: row-major query/result matrices
//! - `graph`: a local cached k-NN adjacency table with a checksummed file format
//! - `titles`: title ↔ row-id lookup tables
//! - `dataset`: local vector files (flat binary always, HDF5 behind a feature)
//! - `config`: connection settings
//!
//! # A round trip
//!
//! ```rust,no_run
//! use juxta::{GpuClient, Metric};
//!
//! # fn main() -> juxta::Result<()> {
//! let mut client = GpuClient::open("appliance.example.net", 4970, "apikey")?;
//! client.load_dataset_file("/data/wiki_lsi.h5", "lsi", Metric::L2)?;
//!
//! let query = vec![0.0f32; 300];
//! let results = client.query_one(&query, 10)?;
//! for n in results.neighbors(0).unwrap() {
//!     println!("row {} at distance {:.3}", n.index, n.distance);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Distance semantics
//!
//! The appliance ranks under two metrics: `L2` (squared Euclidean, same
//! ranking as true L2) and `IP` (inner product). Cosine similarity is inner
//! product over L2-normalized vectors; normalize both the dataset and the
//! queries first (`Matrix::normalize_rows`).
//!
//! # Self-matches
//!
//! When a dataset is queried against itself (the neighbor-graph workflow),
//! the top hit of each row is the row itself at distance zero. Ask for
//! `k + 1` neighbors and skip the self-match when presenting results.

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod matrix;
pub mod protocol;
pub mod titles;

pub use client::{GpuClient, Timings, DEFAULT_BATCH_SIZE};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use graph::NeighborGraph;
pub use matrix::{Matrix, Neighbor, QueryResults};
pub use protocol::{Command, Metric, Status};
pub use titles::TitleIndex;
