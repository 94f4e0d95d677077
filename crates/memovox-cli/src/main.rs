mod app;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "memovox",
    version,
    about = "Record voice memos and transcribe them from the terminal"
)]
struct Cli {
    /// Print debug information while running
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Record a voice memo and transcribe it (default)
    Record(commands::record::RecordArgs),
    /// Show or edit saved transcriptions
    History(commands::history::HistoryArgs),
    /// List available microphone devices
    Devices,
    /// Show or change configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Pick up MEMOVOX_API_KEY and friends from a local .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    memovox_core::set_verbose(cli.verbose);

    match cli.command {
        Some(Command::Record(args)) => commands::record::run(args).await,
        Some(Command::History(args)) => commands::history::run(args),
        Some(Command::Devices) => commands::devices::run(),
        Some(Command::Config(args)) => commands::config::run(args),
        None => commands::record::run(Default::default()).await,
    }
}
