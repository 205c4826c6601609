use clap::Parser;
use build_gateway::cli::{self, Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match cli.command.unwrap_or_default() {
        Command::Serve => cli::serve::run().await,
    };

    std::process::exit(code);
}
