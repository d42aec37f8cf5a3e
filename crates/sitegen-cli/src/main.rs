use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::replay::ReplayArgs;
use commands::scan::ScanArgs;

#[derive(Parser, Debug)]
#[command(
    name = "sitegen",
    version,
    about = "Replay recorded model output through the page reconstruction engine"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a recorded response through a generation session
    Replay(ReplayArgs),
    /// Print the blocks found in a recorded response
    Scan(ScanArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    match cli.command {
        Command::Replay(args) => commands::replay::run(args).await,
        Command::Scan(args) => commands::scan::run(args),
    }
}
