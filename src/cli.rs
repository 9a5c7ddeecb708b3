use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_RECORDS_FILE: &str = "survey_vars.json";

#[derive(Parser, Debug)]
#[command(
    name = "cdbk",
    version,
    about = "Survey codebook extraction and review tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn debug_logging(&self) -> bool {
        matches!(&self.command, Commands::Extract(args) if args.debug)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the variable record collection from pdf2txt.py HTML output.
    Extract(ExtractArgs),
    /// Browse an extracted record collection for manual verification.
    View(ViewArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// HTML output from e.g. `pdf2txt.py codebook.pdf -o codebook.html --output_type html`.
    pub cdbk_html: PathBuf,

    #[arg(short, long, default_value = DEFAULT_RECORDS_FILE)]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = LayoutProfile::Generic)]
    pub profile: LayoutProfile,

    /// JSON file overriding individual fields of the selected profile.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Fail on lines that match no pattern outside a variable block.
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    #[arg(long, default_value_t = false)]
    pub allow_empty: bool,

    /// Write intermediate artifacts and enable debug logging.
    #[arg(short, long, default_value_t = false)]
    pub debug: bool,

    #[arg(long, default_value = "debug")]
    pub debug_dir: PathBuf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LayoutProfile {
    Generic,
    Clps,
}

impl LayoutProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Clps => "clps",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    #[arg(long, default_value = DEFAULT_RECORDS_FILE)]
    pub data: PathBuf,

    #[arg(long, default_value_t = false, conflicts_with_all = ["variable", "index"])]
    pub list: bool,

    #[arg(long, conflicts_with = "index")]
    pub variable: Option<String>,

    #[arg(long)]
    pub index: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
