use super::commands;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the entries and features of a store file
    Inspect {
        #[arg(short, long)]
        store: PathBuf,
    },
    /// Copy or link a set of entries into a new store file
    Subset {
        #[arg(long)]
        source: PathBuf,
        /// Comma separated entry ids
        #[arg(
            long,
            value_delimiter = ',',
            required_unless_present = "ids_file",
            conflicts_with = "ids_file"
        )]
        ids: Vec<String>,
        /// JSON file holding a list of entry ids
        #[arg(long)]
        ids_file: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Copy the arrays instead of linking to the source
        #[arg(long)]
        hardcopy: bool,
    },
    /// Build a dataset from a JSON config and print the shapes of one sample
    Sample {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        index: usize,
        /// Read the config as a grid dataset
        #[arg(long)]
        grid: bool,
    },
}

impl Cli {
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Inspect { store } => commands::inspect::execute(store),
            Commands::Subset {
                source,
                ids,
                ids_file,
                output,
                hardcopy,
            } => commands::subset::execute(source, ids, ids_file, output, hardcopy),
            Commands::Sample {
                config,
                index,
                grid,
            } => commands::sample::execute(config, index, grid),
        }
    }
}
