pub mod commands;

use clap::{Parser, Subcommand};

use crate::actions::ComicAction;
use crate::domain::ComicSort;

#[derive(Parser)]
#[command(name = "comicvault")]
#[command(about = "An offline-first xkcd reader", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/comicvault/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the archive and list new comics
    Refresh,
    /// List known comics
    List {
        /// Only favorites
        #[arg(long)]
        favorites: bool,
        /// Match titles containing this text
        #[arg(short, long)]
        search: Option<String>,
        /// Sort order (defaults to the configured one)
        #[arg(long, value_enum)]
        sort: Option<ComicSort>,
        /// Maximum comics to show (defaults to the configured page size)
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(short, long, default_value_t = 0)]
        offset: u32,
    },
    /// Show a comic, fetching it when not cached
    Show { id: i64 },
    /// Mark or unmark a favorite
    Favorite {
        id: i64,
        /// Remove the favorite mark
        #[arg(long)]
        off: bool,
    },
    /// Attach a note to a comic
    Note { id: i64, text: String },
    /// Show or clear the viewing history
    History {
        #[arg(short, long)]
        limit: Option<u32>,
        #[arg(short, long, default_value_t = 0)]
        offset: u32,
        /// Delete every history entry
        #[arg(long)]
        clear: bool,
    },
    /// Fetch the explanation of a comic
    Explain { id: i64 },
    /// Run a comic action
    Action {
        id: i64,
        #[arg(value_enum)]
        action: ComicAction,
    },
}
