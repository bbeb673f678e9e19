use crate::cli::Commands;
use anyhow::Result;

pub mod start;
pub mod validate;

/// Dispatch command to appropriate handler
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Start { config, node_name } => start::execute(&config, node_name).await,

        Commands::Validate { config } => validate::execute(&config),

        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_version() {
    println!("Nodelet node agent");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Runtimes:");
    println!("  runp  local process supervisor");
    println!("  runc  local container runtime (CRI)");
    println!("  runk  delegated Kubernetes cluster");
}
