//! CLI domain: parse, route, output and presentation only.
//! Repository semantics live in the library; the route table only loads,
//! calls and saves.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands, OutputFormat};
pub use route::RunContext;
