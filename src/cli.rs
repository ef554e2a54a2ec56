use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use deskdex::IndexKind;

#[derive(Debug, Parser)]
#[command(
    name = "deskdex",
    about = "Write-back inverted word index for desktop search"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Operate on the update index instead of the primary index
    #[arg(long, global = true)]
    pub update: bool,

    /// Bucket count used when creating an index file
    #[arg(long, global = true)]
    pub min_buckets: Option<u32>,

    /// Bucket count used when reopening an index file
    #[arg(long, global = true)]
    pub max_buckets: Option<u32>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn index_kind(&self) -> IndexKind {
        if self.update {
            IndexKind::Update
        } else {
            IndexKind::Primary
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a weight for one word in one document
    Add(AddArgs),
    /// Index every word of a text file under one document ID
    IndexText(TextArgs),
    /// Remove every word of a text file from one document ID
    RemoveText(TextArgs),
    /// Show the stored hits for a word
    Lookup(LookupArgs),
    /// Suggest the closest stored word
    Suggest(SuggestArgs),
    /// Show index statistics
    Status(StatusArgs),
    /// Fold the update index into the primary index
    Merge,
    /// Reclaim free space in the index file
    Optimize,
    /// Delete all index files
    Reset,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Add --

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// The word to index
    pub word: String,

    /// Document ID
    pub doc: u32,

    /// Service type of the document
    #[arg(short = 's', long, default_value = "0")]
    pub service_type: u8,

    /// Weight to add; negative values remove
    #[arg(
        short = 'w',
        long,
        default_value = "1",
        allow_negative_numbers = true
    )]
    pub weight: i32,
}

// -- Index/remove text --

#[derive(Debug, Parser)]
pub struct TextArgs {
    /// Text file to read
    pub file: PathBuf,

    /// Document ID the words belong to
    #[arg(short = 'd', long)]
    pub doc: u32,

    /// Service type of the document
    #[arg(short = 's', long, default_value = "0")]
    pub service_type: u8,
}

// -- Lookup --

#[derive(Debug, Parser)]
pub struct LookupArgs {
    /// The word to look up
    pub word: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Suggest --

#[derive(Debug, Parser)]
pub struct SuggestArgs {
    /// The misspelled term
    pub term: String,

    /// Maximum edit distance
    #[arg(long, default_value = "3")]
    pub distance: usize,
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
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "deskdex",
            &mut std::io::stdout(),
        );
    }
}
