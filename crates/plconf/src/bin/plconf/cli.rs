//! plconf cli interface

use clap::{Parser, Subcommand};
use plconf::{NamespaceMode, OutputFormat};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; plconf ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a tree of perl declaration files
    ///
    /// Writes config.yml and diagnostics.yml (or .json) into the output directory
    Convert(ConvertCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct ConvertCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    /// Directory the documents are written to, created if missing
    pub output: PathBuf,

    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Root directory of the declaration files
    pub input: PathBuf,

    /// Where namespaces come from
    #[arg(short = 'n', long = "namespace", default_value_t)]
    pub namespace: NamespaceMode,

    /// Ignore require statements, treat every subdirectory as one product
    #[clap(long = "no-require")]
    pub no_require: bool,

    /// Name of the file aggregating all requires (replaces the defaults)
    ///
    /// Can be specified multiple times, earlier names are preferred.
    #[clap(short = 'a', long = "aggregator")]
    pub aggregators: Vec<String>,

    /// Extension of declaration files
    #[clap(long = "extension", default_value = "pl")]
    pub extension: String,
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Files in processing order
    Order,
    /// Parser events per file
    Declarations,
}
