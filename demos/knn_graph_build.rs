//! Build a cached k-NN graph of a dataset.
//!
//! Queries a dataset on the appliance against itself (every row is a query)
//! and saves the resulting adjacency table to a local cache file that
//! `knn_graph_lookup` reads without any network access.
//!
//! ```bash
//! cargo run --example knn_graph_build -- \
//!     --host appliance.example.net --api-key apikey \
//!     --remote-path /data/wiki/lsi_index.h5 \
//!     --output wiki_data/lsi_10nn_graph.knng
//! ```
//!
//! With `--vectors` pointing at a local copy of the dataset, a small test
//! query first measures GPU throughput and prints a completion estimate.

use anyhow::Context;
use clap::Parser;
use juxta::{dataset, GpuClient, Metric, NeighborGraph};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Build and cache the k-NN graph of a remote dataset")]
struct Args {
    /// Appliance host name or IP address
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Appliance port
    #[arg(long, default_value_t = 4970)]
    port: u16,

    /// Access key for the appliance
    #[arg(long, default_value = "")]
    api_key: String,

    /// Dataset file path on the appliance disk
    #[arg(long)]
    remote_path: String,

    /// Dataset name within the file (HDF5 only)
    #[arg(long, default_value = "lsi")]
    dataset: String,

    /// Output path for the graph cache file
    #[arg(long)]
    output: PathBuf,

    /// Neighbors per row; one extra for the self-match
    #[arg(long, default_value_t = 11)]
    k: usize,

    /// Server-side batch size (1024 works well for million-row datasets)
    #[arg(long, default_value_t = 1024)]
    batch_size: usize,

    /// Local copy of the dataset, used only to estimate throughput
    #[arg(long)]
    vectors: Option<PathBuf>,

    /// Skip the remote dataset load (already loaded on a previous run)
    #[arg(long)]
    skip_load: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Connecting to appliance at {}:{}...", args.host, args.port);
    let mut client = GpuClient::open(&args.host, args.port, &args.api_key)?;
    println!("    Connection successful.\n");

    if !args.skip_load {
        println!("Loading dataset vectors into GPU memory...");
        client.load_dataset_file(&args.remote_path, &args.dataset, Metric::L2)?;
    }

    if let Some(local) = &args.vectors {
        println!("Performing a test query to estimate throughput...");
        let vectors = dataset::load_vectors(local, &args.dataset)?;

        // A few batches are enough to measure steady-state GPU throughput.
        let test_rows = (4 * args.batch_size).min(vectors.rows());
        let test_batch = vectors.slice_rows(0, test_rows)?;
        client.set_batch_size(args.batch_size)?;
        client.query(&test_batch, args.k)?;

        // Query vectors for the graph live on the appliance already, so
        // network overhead is excluded from the estimate.
        let server_secs = client.timings().server.as_secs_f64();
        let throughput = test_rows as f64 / server_secs.max(1e-9);
        let est_min = vectors.rows() as f64 / throughput / 60.0;
        println!(
            "GPU throughput (batch size {}) is {throughput:.0} queries per second.",
            args.batch_size
        );
        println!("Estimated time to complete the graph: {est_min:.0} min\n");
    }

    println!(
        "Building k-NN graph (k={}, batch size {})...",
        args.k, args.batch_size
    );
    let results = client.query_from_file(&args.remote_path, &args.dataset, args.k, args.batch_size)?;
    println!("{}", client.timings());
    client.close()?;

    println!("Writing graph cache to {}...", args.output.display());
    let graph = NeighborGraph::from_results(results);
    graph
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!("Done: {} rows, {} neighbors each.", graph.len(), graph.k());
    Ok(())
}
