//! tfsam cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Transform Terraform to AWS SAM", long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; tfsam ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transform terraform .tf file to sam format
    ///
    /// Writes the template next to the input file (`main.tf` -> `main.yaml`)
    /// unless --print is given.
    #[command(alias = "t")]
    Transform(TransformCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct TransformCommand {
    #[clap(flatten)]
    pub config: ConfigArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Print generated template instead of writing to file
    #[clap(short = 'p', long = "print")]
    pub print: bool,

    /// Only transform resources whose `type.name` matches this pattern
    #[clap(short = 'f', long = "filter")]
    pub filter: Option<String>,

    /// Path to terraform file
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Configuration directory (rule sets, name tables, base template)
    #[clap(short = 'c', long = "config", default_value = "config")]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Loaded resources
    Resources { file: PathBuf },
    /// Relationship graph
    Relationships { file: PathBuf },
}
