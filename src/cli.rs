use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::engine::Depth;

#[derive(Debug, Parser)]
#[command(
    name = "askdocs",
    about = "Ask natural-language questions over a heterogeneous document collection"
)]
pub struct Cli {
    /// Override the index data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the source documents
    #[arg(long, default_value = "data", global = true)]
    pub docs: PathBuf,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the index from the documents directory (or refresh a stale one)
    Index(IndexArgs),
    /// Ask a question and synthesize an answer
    Ask(AskArgs),
    /// Retrieval only: show the matching documents and chunks
    Search(SearchArgs),
    /// Show collection statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

/// Analysis depth exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DepthArg {
    Quick,
    Standard,
    Deep,
}

impl From<DepthArg> for Depth {
    fn from(value: DepthArg) -> Self {
        match value {
            DepthArg::Quick => Depth::Quick,
            DepthArg::Standard => Depth::Standard,
            DepthArg::Deep => Depth::Deep,
        }
    }
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Rebuild even when the persisted index matches the source
    #[arg(long)]
    pub force: bool,
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question to answer
    pub question: String,

    /// Analysis depth
    #[arg(short, long, value_enum, default_value_t = DepthArg::Standard)]
    pub depth: DepthArg,

    /// Output the full response structure as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the assembled context below the answer
    #[arg(long)]
    pub show_context: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Analysis depth
    #[arg(short, long, value_enum, default_value_t = DepthArg::Standard)]
    pub depth: DepthArg,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
