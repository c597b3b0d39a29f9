use clap::{Parser, Subcommand};
use memvault_cli::client::MemvaultClient;
use memvault_cli::commands::{MemoryCommand, StatsCommand};
use memvault_cli::error::CliResult;
use memvault_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "memvault-cli")]
#[command(about = "Memvault CLI - client for the memvault daemon")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(
        long,
        short = 's',
        global = true,
        default_value = "http://127.0.0.1:7070",
        help = "Base URL of the memvault daemon"
    )]
    pub server: String,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Store, search, and inspect memory records")]
    Memory(MemoryCommand),

    #[clap(about = "Show daemon statistics")]
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let client = MemvaultClient::new(&cli.server);

    match &cli.command {
        Command::Memory(cmd) => cmd.execute(&client, format).await,
        Command::Stats(cmd) => cmd.execute(&client, format).await,
    }
}
