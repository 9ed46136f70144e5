use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "sqzip")]
#[command(version)]
#[command(about = "Pack directory trees into SQZIP archives and unpack them", long_about = None)]
#[command(after_help = "Examples:\n  \
  sqzip -c assets assets.sqz     pack the assets directory into assets.sqz\n  \
  sqzip assets.sqz -d out        extract assets.sqz into out\n  \
  sqzip -v assets.sqz            list entries with sizes and hashes\n  \
  sqzip -t assets.sqz            check every file against its stored hash")]
pub struct Cli {
    /// Archive file path
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Create ARCHIVE from the contents of DIR
    #[arg(short = 'c', value_name = "DIR", conflicts_with_all = ["list", "verbose", "test", "extract_dir"])]
    pub create: Option<String>,

    /// List entries (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Test archive integrity without extracting
    #[arg(short = 't')]
    pub test: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Most verbose level of library logging to show, from the `-q` count
    pub fn log_level(&self) -> tracing::Level {
        match self.quiet {
            0 => tracing::Level::INFO,
            1 => tracing::Level::WARN,
            _ => tracing::Level::ERROR,
        }
    }
}
