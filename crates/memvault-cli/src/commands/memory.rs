use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use memvault_server::api::{SearchMemoriesRequest, StoreMemoryRequest, WireMemory};
use uuid::Uuid;

use crate::client::MemvaultClient;
use crate::error::CliResult;
use crate::output::{OutputFormat, format_score, format_timestamp, truncate_string};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "Store a conversation record")]
    Store(StoreArgs),

    #[clap(about = "Search records by embedding similarity")]
    Search(SearchArgs),

    #[clap(about = "List the most recent records")]
    Recent(RecentArgs),

    #[clap(about = "Show one record by id")]
    Show(ShowArgs),
}

#[derive(Parser)]
pub struct StoreArgs {
    #[clap(help = "Record content text")]
    pub content: String,

    #[clap(long, help = "Embedding vector as a JSON array, e.g. '[0.1, 0.2]'")]
    pub embedding: Option<String>,

    #[clap(
        long,
        conflicts_with = "embedding",
        help = "File containing the embedding vector as a JSON array"
    )]
    pub embedding_file: Option<PathBuf>,

    #[clap(
        long = "meta",
        value_parser = parse_key_val,
        help = "Metadata entry as key=value (repeatable)"
    )]
    pub metadata: Vec<(String, String)>,

    #[clap(long = "tag", help = "Tag to attach (repeatable)")]
    pub tags: Vec<String>,
}

#[derive(Parser)]
pub struct SearchArgs {
    #[clap(long, help = "Query embedding as a JSON array, e.g. '[0.1, 0.2]'")]
    pub embedding: Option<String>,

    #[clap(
        long,
        conflicts_with = "embedding",
        help = "File containing the query embedding as a JSON array"
    )]
    pub embedding_file: Option<PathBuf>,

    #[clap(long, short, default_value = "10", help = "Maximum number of matches")]
    pub limit: i64,

    #[clap(
        long,
        short,
        default_value = "0.7",
        help = "Minimum similarity score (-1.0 to 1.0)"
    )]
    pub threshold: f32,

    #[clap(
        long = "filter",
        value_parser = parse_key_val,
        help = "Metadata filter as key=value; use tag=<name> to filter by tag (repeatable)"
    )]
    pub filters: Vec<(String, String)>,
}

#[derive(Parser)]
pub struct RecentArgs {
    #[clap(long, short, default_value = "10", help = "Number of records to fetch")]
    pub limit: i64,
}

#[derive(Parser)]
pub struct ShowArgs {
    #[clap(help = "Record ID (UUID format)")]
    pub id: String,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

fn load_embedding(inline: Option<&str>, file: Option<&PathBuf>) -> CliResult<Vec<f32>> {
    let raw = match (inline, file) {
        (Some(s), None) => s.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        _ => return Err("provide exactly one of --embedding or --embedding-file".into()),
    };
    serde_json::from_str(&raw).map_err(|e| format!("invalid embedding JSON: {e}").into())
}

impl MemoryCommand {
    pub async fn execute(&self, client: &MemvaultClient, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::Store(args) => Self::store(client, args, format).await,
            MemorySubcommand::Search(args) => Self::search(client, args, format).await,
            MemorySubcommand::Recent(args) => Self::recent(client, args, format).await,
            MemorySubcommand::Show(args) => Self::show(client, args, format).await,
        }
    }

    async fn store(client: &MemvaultClient, args: &StoreArgs, format: OutputFormat) -> CliResult<()> {
        let embedding = load_embedding(args.embedding.as_deref(), args.embedding_file.as_ref())?;

        let request = StoreMemoryRequest {
            content: args.content.clone(),
            embedding,
            metadata: args.metadata.iter().cloned().collect::<HashMap<_, _>>(),
            tags: args.tags.clone(),
        };

        let response = client.store(&request).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            OutputFormat::Table => {
                println!("Stored: {}", response.memory_id);
            }
        }

        Ok(())
    }

    async fn search(
        client: &MemvaultClient,
        args: &SearchArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let query_embedding =
            load_embedding(args.embedding.as_deref(), args.embedding_file.as_ref())?;

        let request = SearchMemoriesRequest {
            query_embedding,
            limit: args.limit,
            similarity_threshold: args.threshold,
            filters: args.filters.iter().cloned().collect::<HashMap<_, _>>(),
        };

        let response = client.search(&request).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            OutputFormat::Table => {
                if response.matches.is_empty() {
                    println!("No matches.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Score", "ID", "Content", "Tags", "Created"]);

                for m in &response.matches {
                    table.add_row([
                        format_score(m.similarity_score),
                        truncate_string(&m.memory.id, 8),
                        truncate_string(&m.memory.content, 50),
                        m.memory.tags.join(", "),
                        format_timestamp(&m.memory.created_at),
                    ]);
                }

                println!("{table}");
                println!("\nTotal: {} matches", response.matches.len());
            }
        }

        Ok(())
    }

    async fn recent(
        client: &MemvaultClient,
        args: &RecentArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let response = client.recent(args.limit).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            OutputFormat::Table => {
                if response.memories.is_empty() {
                    println!("No records yet.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["ID", "Content", "Tags", "Created"]);

                for memory in &response.memories {
                    table.add_row([
                        truncate_string(&memory.id, 8),
                        truncate_string(&memory.content, 50),
                        memory.tags.join(", "),
                        format_timestamp(&memory.created_at),
                    ]);
                }

                println!("{table}");
                println!("\nTotal: {} records", response.memories.len());
            }
        }

        Ok(())
    }

    async fn show(client: &MemvaultClient, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        Uuid::parse_str(&args.id).map_err(|e| format!("Invalid UUID format: {e}"))?;

        let response = client.get(&args.id).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            OutputFormat::Table => print_memory(&response.memory),
        }

        Ok(())
    }
}

fn print_memory(memory: &WireMemory) {
    println!("ID:      {}", memory.id);
    println!("Created: {}", format_timestamp(&memory.created_at));
    if !memory.tags.is_empty() {
        println!("Tags:    {}", memory.tags.join(", "));
    }
    if !memory.metadata.is_empty() {
        println!("Metadata:");
        let mut keys: Vec<_> = memory.metadata.keys().collect();
        keys.sort();
        for key in keys {
            println!("  {key} = {}", memory.metadata[key]);
        }
    }
    println!("\n{}", memory.content);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("user_id=alice").unwrap(),
            ("user_id".to_string(), "alice".to_string())
        );
        assert_eq!(
            parse_key_val("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("no-separator").is_err());
    }

    #[test]
    fn test_load_embedding_inline() {
        let embedding = load_embedding(Some("[0.5, -0.25, 1.0]"), None).unwrap();
        assert_eq!(embedding, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_load_embedding_requires_exactly_one_source() {
        assert!(load_embedding(None, None).is_err());
    }
}
