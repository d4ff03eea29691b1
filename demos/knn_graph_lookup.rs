//! Offline article similarity lookup.
//!
//! Answers the same question as `article_search_live` without touching the
//! network, using the graph cache produced by `knn_graph_build`.
//!
//! ```bash
//! cargo run --example knn_graph_lookup -- \
//!     --graph wiki_data/lsi_10nn_graph.knng \
//!     --titles wiki_data/titles_to_id.json \
//!     --title "Water treatment"
//! ```

use anyhow::Context;
use clap::Parser;
use juxta::{NeighborGraph, TitleIndex};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(about = "Look up similar articles in a cached k-NN graph")]
struct Args {
    /// Graph cache file from knn_graph_build
    #[arg(long)]
    graph: PathBuf,

    /// Title table (.json or .tsv)
    #[arg(long)]
    titles: PathBuf,

    /// Query article title, capitalized as in the dataset
    #[arg(long)]
    title: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Loading article titles...");
    let titles = TitleIndex::load(&args.titles)?;

    println!("Loading graph cache from {}...", args.graph.display());
    let graph = NeighborGraph::load(&args.graph)?;

    let query_id = titles
        .id(&args.title)
        .with_context(|| format!("article title \"{}\" does not match any in the dataset", args.title))?;

    println!("\nFinding most similar articles to \"{}\"...\n", args.title);
    let t0 = Instant::now();
    let neighbors = graph.neighbors(query_id as usize)?;

    println!("    {:>50}    Distance", "Title");
    println!("    {:>50}    ========", "=====");
    for neighbor in &neighbors {
        if neighbor.index >= 0 && neighbor.index as u32 == query_id {
            continue;
        }
        let title = u32::try_from(neighbor.index)
            .ok()
            .and_then(|id| titles.title(id))
            .unwrap_or("<unknown>");
        println!("    {title:>50}    {:.3}", neighbor.distance);
    }

    println!("\nGraph lookup took {:.0} ms.", t0.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}
