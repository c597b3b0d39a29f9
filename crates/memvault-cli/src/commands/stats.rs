use clap::Parser;

use crate::client::MemvaultClient;
use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct StatsCommand {}

impl StatsCommand {
    pub async fn execute(&self, client: &MemvaultClient, format: OutputFormat) -> CliResult<()> {
        let stats = client.stats().await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            OutputFormat::Table => {
                println!("Memvault Statistics");
                println!("===================\n");
                println!("Records:          {}", stats.total_records);
                println!("Indexed vectors:  {}", stats.indexed_vectors);
                println!("Catalog entries:  {}", stats.cataloged_records);
                println!("Ledger entries:   {}", stats.ledger_entries);
            }
        }

        Ok(())
    }
}
