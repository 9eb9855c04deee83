use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pagekv::{BPlusTree, KVStore, StorageConfig};

#[derive(Parser)]
#[command(name = "pagekv", about = "Paged key-value store and B+ tree index")]
struct Cli {
    /// Key-value store file used by put, get, remove and keys
    #[arg(short, long, default_value = "pagekv.db")]
    file: PathBuf,

    /// B+ tree index file used by insert, search and scan
    #[arg(short, long, default_value = "pagekv.idx")]
    index_file: PathBuf,

    /// JSON storage config
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a value in the key-value store
    Put { key: String, value: String },
    /// Print the value stored for a key
    Get { key: String },
    /// Remove a key from the key-value store
    Remove { key: String },
    /// List live keys in the key-value store
    Keys,
    /// Insert a key into the B+ tree index
    Insert { key: String, value: u64 },
    /// Look up a key in the B+ tree index
    Search { key: String },
    /// Print index entries in key order, optionally limited to a range
    Scan {
        lower: Option<String>,
        upper: Option<String>,
    },
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig::default(),
    };

    match cli.command {
        Command::Put { key, value } => {
            KVStore::open_with_config(&cli.file, &config)?.put(&key, &value)?;
        }
        Command::Get { key } => match KVStore::open_with_config(&cli.file, &config)?.get(&key)? {
            Some(value) => println!("{value}"),
            None => println!("(not found)"),
        },
        Command::Remove { key } => {
            let removed = KVStore::open_with_config(&cli.file, &config)?.remove(&key)?;
            println!("{}", if removed { "removed" } else { "(not found)" });
        }
        Command::Keys => {
            for key in KVStore::open_with_config(&cli.file, &config)?.keys() {
                println!("{key}");
            }
        }
        Command::Insert { key, value } => {
            BPlusTree::open_with_config(&cli.index_file, &config)?.insert(&key, value)?;
        }
        Command::Search { key } => {
            match BPlusTree::open_with_config(&cli.index_file, &config)?.search(&key)? {
                Some(value) => println!("{value}"),
                None => println!("(not found)"),
            }
        }
        Command::Scan { lower, upper } => {
            let mut tree = BPlusTree::open_with_config(&cli.index_file, &config)?;
            let lower = lower.unwrap_or_default();
            let entries = match upper {
                Some(upper) => tree.range(&lower, &upper)?,
                None => tree
                    .entries()?
                    .into_iter()
                    .filter(|(key, _)| *key >= lower)
                    .collect(),
            };
            for (key, value) in entries {
                println!("{key}\t{value}");
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
