use clap::{Args, Parser, Subcommand};

/// Version string with the build timestamp embedded by build.rs.
pub const LONG_VERSION: &str =
    concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(
    name = "vulngate",
    version,
    long_version = LONG_VERSION,
    about = "CI vulnerability gate for container images"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan one image and gate on the severity policy
    Gate(GateArgs),
    /// Rescan tracked images that are due
    Rescan(RescanArgs),
    /// Inspect or seed the rescan schedule
    Schedule(ScheduleArgs),
    /// List exception rules and their status
    Exceptions(ExceptionsArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct GateArgs {
    /// Container image reference to scan
    #[arg(short, long)]
    pub image: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Report file path; defaults to gate-report.json under the configured
    /// output directory
    #[arg(short, long)]
    pub output: Option<String>,

    /// Report format: json, markdown
    #[arg(long)]
    pub format: Option<String>,

    /// Do not register this image in the rescan schedule
    #[arg(long)]
    pub no_track: bool,
}

#[derive(Args, Clone)]
pub struct RescanArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Rescan every tracked image, due or not
    #[arg(long)]
    pub all: bool,

    /// Cap on concurrent scans
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Abort scans that have not started after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Directory for per-image reports; defaults to the configured output
    /// directory, then ./rescan-reports
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args, Clone)]
pub struct ScheduleArgs {
    #[command(subcommand)]
    pub action: ScheduleAction,
}

#[derive(Subcommand, Clone)]
pub enum ScheduleAction {
    /// List tracked digests and their due state
    List {
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Track an image for periodic rescans
    Add {
        /// Image reference to track
        #[arg(short, long)]
        image: String,

        /// Known image digest; defaults to the image reference until a
        /// first scan resolves the real digest
        #[arg(long)]
        digest: Option<String>,

        /// Rescan interval in hours
        #[arg(long)]
        interval_hours: Option<u64>,

        /// YAML configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[derive(Args, Clone)]
pub struct ExceptionsArgs {
    /// Exception rule file
    #[arg(short, long)]
    pub file: String,

    /// Only show rules applicable to this image reference
    #[arg(long)]
    pub image: Option<String>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: String,
}
