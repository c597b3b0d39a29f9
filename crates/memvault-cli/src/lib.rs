pub mod client;
pub mod commands;
pub mod error;
pub mod output;

pub use client::MemvaultClient;
pub use commands::{MemoryCommand, StatsCommand};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_score, format_timestamp, truncate_string};
