//! Live article similarity search.
//!
//! Finds the most similar articles to a query article title by sending its
//! vector to the appliance. Needs the dataset loaded on the appliance, a
//! local copy of the vectors, and a title table.
//!
//! ```bash
//! cargo run --example article_search_live -- \
//!     --host appliance.example.net --api-key apikey \
//!     --remote-path /data/wiki/lsi_index.h5 \
//!     --vectors wiki_data/lsi_index.vec \
//!     --titles wiki_data/titles_to_id.json \
//!     --title "Water treatment"
//! ```
//!
//! The appliance keeps the dataset in GPU memory between connections; pass
//! `--skip-load` on later runs to avoid reloading it.

use anyhow::Context;
use clap::Parser;
use juxta::{dataset, GpuClient, Metric, TitleIndex};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Find the most similar articles to a query article")]
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

    /// Local copy of the dataset vectors (.vec, or .h5 with the hdf5 feature)
    #[arg(long)]
    vectors: PathBuf,

    /// Title table (.json or .tsv)
    #[arg(long)]
    titles: PathBuf,

    /// Query article title, capitalized as in the dataset
    #[arg(long)]
    title: String,

    /// Neighbors to request; the top hit is the query article itself
    #[arg(long, default_value_t = 11)]
    k: usize,

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

    println!("Loading article titles...");
    let titles = TitleIndex::load(&args.titles)?;

    let query_id = titles
        .id(&args.title)
        .with_context(|| format!("article title \"{}\" does not match any in the dataset", args.title))?;

    println!("Reading local query vector...");
    let vectors = dataset::load_vectors(&args.vectors, &args.dataset)?;
    let query = vectors
        .row(query_id as usize)
        .with_context(|| format!("row {query_id} missing from {}", args.vectors.display()))?;

    println!("\nFinding most similar articles to \"{}\"...\n", args.title);
    let results = client.query_one(query, args.k)?;

    println!("    {:>50}    Distance", "Title");
    println!("    {:>50}    ========", "=====");
    for neighbor in results.neighbors(0).expect("one query row") {
        // The nearest neighbor of an indexed article is the article itself.
        if neighbor.index >= 0 && neighbor.index as u32 == query_id {
            continue;
        }
        let title = u32::try_from(neighbor.index)
            .ok()
            .and_then(|id| titles.title(id))
            .unwrap_or("<unknown>");
        println!("    {title:>50}    {:.3}", neighbor.distance);
    }

    println!("\n{}", client.timings());
    client.close()?;
    Ok(())
}
