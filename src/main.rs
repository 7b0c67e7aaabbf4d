use clap::Parser;

use carbongate::cli::{gateway, proxy, relay, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Gateway(args) => gateway::run(args).await,
        Commands::Relay(args) => relay::run(args).await,
        Commands::Proxy(args) => proxy::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
