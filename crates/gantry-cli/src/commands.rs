//! CLI command definitions.

use clap::{Args, Subcommand, ValueEnum};
use gantry_builder::OutputShape;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Expand a test matrix document into job descriptors
    Matrix {
        /// Matrix YAML file (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Build the images required by a job list read from stdin
    Build(BuildArgs),

    /// Pair test cases with built images
    Pair {
        /// JSON file with `matrix` and `images` (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Directory holding the Dockerfiles
    #[arg(value_name = "BUILD_DIRECTORY", default_value = ".")]
    pub dockerfiles_dir: PathBuf,

    /// Shape of the JSON written to stdout
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Dict)]
    pub output: OutputFormat,

    /// Build images without cache
    #[arg(short = 'n', long)]
    pub build_no_cache: bool,

    /// Cache repository, like ghcr.io/USER/REPO (empty to disable)
    #[arg(short = 'r', long)]
    pub cache_repo: Option<String>,

    /// Push the images to the cache repository
    #[arg(short, long)]
    pub push_cache: bool,

    /// Branch the images are built from (used for the image name)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Print the build tool version and exit
    #[arg(long)]
    pub tool_version: bool,

    /// Mirror build output live and log task starts
    #[arg(short, long)]
    pub verbose: bool,

    /// Exit 0 if the tool version is at least this version, 1 otherwise
    #[arg(long, value_name = "VERSION")]
    pub version_test: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    List,
    Dict,
}

impl From<OutputFormat> for OutputShape {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::List => OutputShape::List,
            OutputFormat::Dict => OutputShape::Dict,
        }
    }
}
