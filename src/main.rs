//! CLI interface for the vector database

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use anndb::{RecordStore, Vector};

#[derive(Parser)]
#[command(name = "anndb")]
#[command(about = "An embeddable vector database with HNSW search", long_about = None)]
struct Cli {
    /// Path to the store document
    #[arg(long, default_value = "anndb.json")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new store for vectors of the given dimension
    Init {
        /// Vector dimensionality
        dim: usize,
    },
    /// Add a vector with JSON metadata
    Add {
        /// Vector as comma-separated values (e.g., "1.0,2.0,3.0")
        vector: String,
        /// Metadata as a JSON value (e.g., '{"name":"doc1"}')
        metadata: String,
    },
    /// Print a record
    Get {
        /// Record ID
        id: u64,
    },
    /// Replace a record's vector and metadata
    Update {
        /// Record ID
        id: u64,
        /// Vector as comma-separated values
        vector: String,
        /// Metadata as a JSON value
        metadata: String,
    },
    /// Delete a record
    Delete {
        /// Record ID
        id: u64,
    },
    /// Rebuild the search index from the stored records
    Rebuild,
    /// Search for the k nearest neighbours
    Search {
        /// Number of results to return
        k: usize,
        /// Query vector as comma-separated values
        query: String,
        /// Candidate-list width at layer 0
        #[arg(long, default_value_t = 50)]
        ef: usize,
    },
}

fn parse_metadata(s: &str) -> Result<Value> {
    serde_json::from_str(s).with_context(|| format!("Invalid metadata JSON: {}", s))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { dim } => {
            RecordStore::create(&cli.file, dim)?;
            println!("Initialised store at {} (dimension {})", cli.file.display(), dim);
        }
        Commands::Add { vector, metadata } => {
            let v = Vector::from_csv(&vector)?;
            let meta = parse_metadata(&metadata)?;
            let mut store = RecordStore::open(&cli.file)?;
            let id = store.add(v, meta)?;
            store.save()?;
            println!("Added record with ID: {}", id);
        }
        Commands::Get { id } => {
            let store = RecordStore::open(&cli.file)?;
            match store.get(id) {
                Some(record) => println!("{}", serde_json::to_string_pretty(record)?),
                None => bail!("Record not found: {}", id),
            }
        }
        Commands::Update {
            id,
            vector,
            metadata,
        } => {
            let v = Vector::from_csv(&vector)?;
            let meta = parse_metadata(&metadata)?;
            let mut store = RecordStore::open(&cli.file)?;
            store.update(id, v, meta)?;
            store.save()?;
            println!("Updated record with ID: {}", id);
        }
        Commands::Delete { id } => {
            let mut store = RecordStore::open(&cli.file)?;
            store.delete(id)?;
            store.save()?;
            println!("Deleted record with ID: {}", id);
        }
        Commands::Rebuild => {
            let mut store = RecordStore::open(&cli.file)?;
            store.rebuild_index()?;
            store.save()?;
            println!("Rebuilt index over {} records", store.len());
        }
        Commands::Search { k, query, ef } => {
            let q = Vector::from_csv(&query)?;
            let mut store = RecordStore::open(&cli.file)?;
            if store.is_dirty() {
                bail!("Index out of date: run `rebuild` first");
            }
            // The graph is never persisted; a clean document rebuilds the
            // exact graph of the last explicit rebuild.
            store.rebuild_index()?;
            let results = store.search(&q, k, ef)?;

            if results.is_empty() {
                println!("No results found (store is empty)");
            } else {
                println!("Top {} results:", results.len());
                for (i, result) in results.iter().enumerate() {
                    // The index reports squared Euclidean; display the true distance.
                    println!(
                        "{}. {} (distance: {:.4})",
                        i + 1,
                        result.id,
                        result.distance.sqrt()
                    );
                }
            }
        }
    }
    Ok(())
}

fn main() {
    // Usage errors exit 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}
