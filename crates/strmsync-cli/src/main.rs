use clap::{ArgAction, Parser, Subcommand};
use commands::{auth, config, daemon, library, sync};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "strmsync")]
#[command(about = "strmsync - Keep a media-center library in step with your tracking lists")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the refresh scheduler until interrupted
    #[command(long_about = "Run strmsync in the foreground. The scheduler re-ingests the media-center library, refreshes tracking lists and adds new episodes on the configured intervals. Stop it with Ctrl-C or SIGTERM.")]
    Daemon {
        /// Write logs to this file (rotated daily) instead of stderr
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,

        /// Skip the refreshes normally requested shortly after startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_startup_sync: bool,
    },
    /// Run one tracking-service refresh
    #[command(long_about = "Refresh watched state, collections, watchlists, paused progress and user lists from the tracking service once. Steps whose activity stamp has not moved are skipped unless --force is given.")]
    Sync {
        /// Run every step regardless of activity stamps
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Apply one tracking list to the library
    List {
        /// `watchlist`, `collection` or a user list ID
        list: String,

        /// Which half of the list to apply
        #[arg(long, value_enum)]
        kind: library::KindArg,

        /// Apply the full list instead of the changes since the last run
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Write placeholders for one catalog item
    Add {
        #[arg(value_enum)]
        media: library::MediaArg,

        /// Catalog ID
        id: i64,

        /// Add even when the item is already in the library or was removed before
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Remove one catalog item's placeholders
    Remove {
        #[arg(value_enum)]
        media: library::MediaArg,

        /// Catalog ID
        id: i64,

        /// Forget the item entirely so later list syncs may add it again
        #[arg(long, action = ArgAction::SetTrue)]
        purge: bool,
    },
    /// Report, and optionally remove, duplicate library entries
    Duplicates {
        #[arg(long, action = ArgAction::SetTrue)]
        remove: bool,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Authorize with a tracking service
    Auth {
        #[command(subcommand)]
        service: AuthCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    Show {
        /// Show secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Link this device to a Trakt account (device-code flow)
    Trakt {
        /// Remove the stored Trakt tokens instead
        #[arg(long, action = ArgAction::SetTrue)]
        logout: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Daemon { log_file, .. } => log_file.clone(),
        _ => None,
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Daemon { no_startup_sync, .. } => daemon::run_daemon(no_startup_sync, &output).await,
        Commands::Sync { force } => sync::run_sync(force, &output).await,
        Commands::List { list, kind, force } => library::run_list(&list, kind, force, &output).await,
        Commands::Add { media, id, force } => library::run_add(media, id, force, &output).await,
        Commands::Remove { media, id, purge } => library::run_remove(media, id, purge, &output).await,
        Commands::Duplicates { remove } => library::run_duplicates(remove, &output).await,
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show { full } => config::run_show(full, &output),
            ConfigCommands::Init { force } => config::run_init(force, &output),
        },
        Commands::Auth { service } => match service {
            AuthCommands::Trakt { logout } => auth::run_trakt(logout, &output).await,
        },
    }
}
