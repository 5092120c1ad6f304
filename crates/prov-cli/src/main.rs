use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    comment::{self, CommentArgs},
    configure::{self, ConfigureArgs},
    delete::{self, DeleteArgs},
    diff::{self, DiffArgs},
    export::{self, ExportArgs},
    import::{self, ImportArgs},
    info::{self, InfoArgs},
    init::{self, InitArgs},
    list::{self, ListArgs},
    repeat::{self, RepeatArgs},
    run::{self, RunArgs},
    sync::{self, SyncArgs},
    tag::{self, TagArgs},
    version::{self, VersionArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;
mod interrupt;
mod project;

/// Environment variable holding the log filter, e.g. `PROV_LOG=prov_capture=debug`.
const LOG_ENV: &str = "PROV_LOG";

#[derive(Parser, Debug)]
#[command(name = "prov", about = "Provenance tracking for computational experiments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new project in the current directory.
    Init(InitArgs),
    /// Change settings of the current project.
    Configure(ConfigureArgs),
    /// Show the settings of the current project.
    Info(InfoArgs),
    /// Run a program and capture a provenance record for it.
    Run(RunArgs),
    /// List stored records, optionally filtered by tag.
    List(ListArgs),
    /// Compare two records.
    Diff(DiffArgs),
    /// Re-run a recorded experiment and compare the outcome with the original.
    Repeat(RepeatArgs),
    /// Delete records by label or tag.
    Delete(DeleteArgs),
    /// Attach a comment to a record.
    Comment(CommentArgs),
    /// Add or remove a tag.
    Tag(TagArgs),
    /// Write every record to a JSON file.
    Export(ExportArgs),
    /// Load records from a JSON export.
    Import(ImportArgs),
    /// Synchronize two record stores.
    Sync(SyncArgs),
    /// Print the prov version.
    Version(VersionArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Init(args) => init::run(&args),
        Command::Configure(args) => configure::run(&args),
        Command::Info(args) => info::run(&args),
        Command::Run(args) => run::run(&args),
        Command::List(args) => list::run(&args),
        Command::Diff(args) => diff::run(&args),
        Command::Repeat(args) => repeat::run(&args),
        Command::Delete(args) => delete::run(&args),
        Command::Comment(args) => comment::run(&args),
        Command::Tag(args) => tag::run(&args),
        Command::Export(args) => export::run(&args),
        Command::Import(args) => import::run(&args),
        Command::Sync(args) => sync::run(&args),
        Command::Version(args) => version::run(&args),
    }
}
