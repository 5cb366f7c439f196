use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Inspect file metadata, directories, reparse points and sparse files")]
#[command(after_help = "Run '<command> --help' for detailed options on each command.")]
pub struct Cli {
    /// Override the configuration directory for this invocation
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    /// Emit JSON instead of text for commands that report data
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show metadata for a path
    Stat(StatArgs),
    /// List the entries of a directory
    List(ListArgs),
    /// Create a directory and every missing parent
    Mkdir(PathArgs),
    /// Show the allocated extents of a file
    Extents(PathArgs),
    /// Copy a file, preserving its holes
    CopySparse(CopySparseArgs),
    /// Print the security descriptor of a path as SDDL
    GetSd(PathArgs),
    /// Apply an SDDL security descriptor to a path
    SetSd(SetSdArgs),
    /// Create a symbolic link
    Symlink(SymlinkArgs),
    /// List drive roots
    Drives,
    /// List volumes with their devices and mount paths
    Volumes,
    /// List the named data streams of a file
    Streams(PathArgs),
    /// Classify a reparse point
    Reparse(PathArgs),
    /// Show what this platform supports
    Capabilities,
}

#[derive(Args, Clone, Debug)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Args, Clone, Debug)]
pub struct StatArgs {
    pub path: String,
    /// Report the link itself instead of its target
    #[arg(long)]
    pub no_follow: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ListArgs {
    pub path: String,
    /// Include the `.` and `..` entries
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Args, Clone, Debug)]
pub struct CopySparseArgs {
    /// Existing regular file to copy
    pub source: String,
    /// Destination path; must not exist
    pub destination: String,
}

#[derive(Args, Clone, Debug)]
pub struct SetSdArgs {
    pub path: String,
    /// Security descriptor in SDDL form, e.g. "O:BAG:BAD:(A;;FA;;;BA)"
    pub sddl: String,
}

#[derive(Args, Clone, Debug)]
pub struct SymlinkArgs {
    /// Path the link points at
    pub target: String,
    /// Path of the link to create
    pub link: String,
    /// Create a directory link (Windows)
    #[arg(long)]
    pub dir: bool,
}
