//! Index administration commands: `init`, `ping`, `indices`, `delete-index`.
//!
//! Each prints a short human-readable result on stdout.

use anyhow::{Context, Result};

use crate::config::{validate_index_name, Config, IndexConfig, IndexSchema};
use crate::elastic::{EsClient, IndexSummary};

/// Create the target index if it is missing. Safe to run repeatedly.
pub async fn run_init(
    config: &Config,
    index: Option<&str>,
    schema: Option<IndexSchema>,
) -> Result<()> {
    let target = IndexConfig {
        name: index.map(str::to_string).unwrap_or_else(|| config.index.name.clone()),
        schema: schema.or(config.index.schema),
    };
    validate_index_name(&target.name)?;
    let schema = target.effective_schema();

    let es = EsClient::new(&config.elasticsearch)?;
    if es.ensure_index(&target.name, schema).await? {
        match schema {
            IndexSchema::Basic => println!("Created index '{}'", target.name),
            IndexSchema::Semantic => println!(
                "Created index '{}' (abstract uses semantic_text, embedded on ingest)",
                target.name
            ),
        }
    } else {
        println!("Index '{}' already exists", target.name);
    }
    Ok(())
}

pub async fn run_ping(config: &Config) -> Result<()> {
    let es = EsClient::new(&config.elasticsearch)?;
    let info = es.info().await.context("connectivity check failed")?;
    println!("Connected to Elasticsearch: {}", info.version.number);
    if !info.cluster_name.is_empty() {
        println!("  cluster: {}", info.cluster_name);
    }
    println!("  endpoint: {}", es.base_url());
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let es = EsClient::new(&config.elasticsearch)?;
    let rows = es.list_indices().await?;
    println!("Indices:");
    if rows.is_empty() {
        println!("  (none)");
    }
    for row in &rows {
        println!("{}", format_row(row));
    }
    Ok(())
}

pub async fn run_delete(config: &Config, name: &str) -> Result<()> {
    let es = EsClient::new(&config.elasticsearch)?;
    if es.delete_index(name).await? {
        println!("Deleted index '{}'", name);
    } else {
        println!("Index '{}' does not exist", name);
    }
    Ok(())
}

fn format_row(row: &IndexSummary) -> String {
    format!(
        "  {:<40} docs={:<10} size={}",
        row.name,
        row.docs_count.as_deref().unwrap_or("?"),
        row.store_size.as_deref().unwrap_or("?")
    )
}
