//! Command names used for log spans.

use crate::cli::parse::Commands;

pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Commit { .. } => "commit",
        Commands::Checkout { .. } => "checkout",
        Commands::Features => "features",
        Commands::Associations => "associations",
        Commands::Modules => "modules",
        Commands::Log => "log",
        Commands::Subset { .. } => "subset",
        Commands::Merge { .. } => "merge",
        Commands::Consolidate => "consolidate",
        Commands::Status => "status",
    }
}
