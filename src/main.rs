use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use navcast::core::HistoryRange;
use navcast::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for navcast::AppCommand {
    fn from(cmd: Commands) -> navcast::AppCommand {
        match cmd {
            Commands::Estimate {
                details,
                json,
                watch,
            } => navcast::AppCommand::Estimate {
                details,
                json,
                watch,
            },
            Commands::Add {
                code,
                amount,
                name,
                profit,
            } => navcast::AppCommand::Add {
                code,
                amount,
                name,
                profit,
            },
            Commands::Remove { code } => navcast::AppCommand::Remove { code },
            Commands::List => navcast::AppCommand::List,
            Commands::History { code, range } => navcast::AppCommand::History { code, range },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Estimate today's change for every saved position
    Estimate {
        /// Show per-holding breakdown for each fund
        #[arg(short, long)]
        details: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Refresh every SECS seconds until interrupted
        #[arg(short, long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Add or update a fund position
    Add {
        /// Fund code, e.g. 002611
        code: String,
        /// Position amount
        amount: f64,
        /// Display name; looked up when omitted
        #[arg(short, long)]
        name: Option<String>,
        /// Current holding profit; kept from the saved position when omitted
        #[arg(short, long, allow_negative_numbers = true)]
        profit: Option<f64>,
    },
    /// Remove a fund position
    Remove { code: String },
    /// List saved positions
    List,
    /// Show historical NAV for a fund
    History {
        code: String,
        /// One of 1W, 1M, 3M, 6M, 1Y
        #[arg(short, long, default_value = "1M")]
        range: HistoryRange,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => navcast::cli::setup::setup(),
        Some(cmd) => navcast::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
