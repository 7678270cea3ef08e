//! Strata CLI - strata command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod util;

/// Strata - incremental deduplicating directory backups
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Registry directory (default: the platform data dir)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an archive and take its base snapshot
    Create {
        /// Directory to back up
        source: PathBuf,
        /// Directory that will hold the archive
        archive_dir: PathBuf,
        /// Digest algorithm for change detection
        #[arg(long, default_value = "sha256")]
        algorithm: String,
        /// Maximum number of versions to retain
        #[arg(long, default_value_t = 5)]
        max_versions: usize,
    },
    /// List known archives
    Archives,
    /// Show archive details
    Info {
        /// Archive id, id prefix, source dir, or archive dir
        archive: String,
    },
    /// Take a new snapshot of an archive's source directory
    Snapshot {
        archive: String,
    },
    /// List an archive's versions
    Versions {
        archive: String,
    },
    /// List the files visible at a version
    Files {
        archive: String,
        /// Version id or unique prefix
        version: String,
        /// Only files physically stored by this version
        #[arg(long)]
        exact: bool,
    },
    /// Export a version to a directory
    Export {
        archive: String,
        version: String,
        destination: PathBuf,
        /// Export only physically stored files
        #[arg(long)]
        exact: bool,
    },
    /// Remove a version from an archive
    RemoveVersion {
        archive: String,
        version: String,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Fold oldest versions forward into the base
    Migrate {
        archive: String,
        /// Number of single-step migrations to run
        #[arg(long, conflicts_with = "all")]
        count: Option<usize>,
        /// Collapse the whole chain into one version
        #[arg(long)]
        all: bool,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Remove an archive and its registry record
    Remove {
        archive: String,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let registry_dir = util::registry_dir(cli.registry)?;

    match cli.command {
        Commands::Create {
            source,
            archive_dir,
            algorithm,
            max_versions,
        } => cmd::create(&registry_dir, &source, &archive_dir, &algorithm, max_versions),
        Commands::Archives => cmd::archives(&registry_dir),
        Commands::Info { archive } => cmd::info(&registry_dir, &archive),
        Commands::Snapshot { archive } => cmd::snapshot(&registry_dir, &archive),
        Commands::Versions { archive } => cmd::versions(&registry_dir, &archive),
        Commands::Files {
            archive,
            version,
            exact,
        } => cmd::files(&registry_dir, &archive, &version, exact),
        Commands::Export {
            archive,
            version,
            destination,
            exact,
        } => cmd::export(&registry_dir, &archive, &version, &destination, exact),
        Commands::RemoveVersion {
            archive,
            version,
            yes,
        } => cmd::remove_version(&registry_dir, &archive, &version, yes),
        Commands::Migrate {
            archive,
            count,
            all,
            yes,
        } => cmd::migrate(&registry_dir, &archive, count, all, yes),
        Commands::Remove { archive, yes } => cmd::remove(&registry_dir, &archive, yes),
    }
}
