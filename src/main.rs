use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use orca::cli::{QueryFlags, Shape};
use orca::core::log::init_logging;

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

#[derive(Args, Clone, Copy)]
struct OutputArgs {
    /// Align columns to the full universe
    #[arg(long)]
    reindex: bool,

    /// Label rows with calendar dates instead of date tokens
    #[arg(long)]
    datetime_index: bool,
}

impl OutputArgs {
    fn flags(self, delay: usize) -> QueryFlags {
        QueryFlags {
            reindex: self.reindex,
            datetime_index: self.datetime_index,
            delay,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List the field names stored in a collection
    Fields { collection: String },
    /// Read a field over a date range
    Fetch {
        collection: String,
        dname: String,
        start: String,
        end: Option<String>,
        /// Trading days to look back before start
        #[arg(long, default_value_t = 0)]
        backdays: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Read a field over the trading days ending at a date
    History {
        collection: String,
        dname: String,
        date: String,
        backdays: usize,
        /// Shift the window back by this many trading days
        #[arg(long, default_value_t = 0)]
        delay: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Read one day's cross-section of a field
    Daily {
        collection: String,
        dname: String,
        date: String,
        /// Trading days before date
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Display N-day compounded returns
    Returns {
        horizon: usize,
        start: String,
        end: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Read intraday values at one or more HHMMSS timestamps
    Intraday {
        dname: String,
        date: String,
        #[arg(required = true)]
        times: Vec<String>,
        /// Trading days before date
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[command(flatten)]
        output: OutputArgs,
    },
}

impl From<Commands> for orca::AppCommand {
    fn from(cmd: Commands) -> orca::AppCommand {
        match cmd {
            Commands::Fields { collection } => orca::AppCommand::Fields { collection },
            Commands::Fetch {
                collection,
                dname,
                start,
                end,
                backdays,
                output,
            } => orca::AppCommand::Query {
                collection,
                dname,
                shape: Shape::Range {
                    start,
                    end,
                    backdays,
                },
                flags: output.flags(0),
            },
            Commands::History {
                collection,
                dname,
                date,
                backdays,
                delay,
                output,
            } => orca::AppCommand::Query {
                collection,
                dname,
                shape: Shape::History { date, backdays },
                flags: output.flags(delay),
            },
            Commands::Daily {
                collection,
                dname,
                date,
                offset,
                output,
            } => orca::AppCommand::Query {
                collection,
                dname,
                shape: Shape::Daily { date, offset },
                flags: output.flags(0),
            },
            Commands::Returns {
                horizon,
                start,
                end,
                output,
            } => orca::AppCommand::Returns {
                horizon,
                start,
                end,
                flags: output.flags(0),
            },
            Commands::Intraday {
                dname,
                date,
                times,
                offset,
                output,
            } => orca::AppCommand::Intraday {
                dname,
                date,
                times,
                offset,
                flags: output.flags(0),
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => orca::cli::setup::setup_at_path(path),
            None => orca::cli::setup::setup(),
        },
        Some(cmd) => orca::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
