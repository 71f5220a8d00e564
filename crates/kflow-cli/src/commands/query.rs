//! Query command - dump the first rows of a table

use anyhow::{Context, Result};
use clap::Args;
use kflow_config::KflowConfig;
use kflow_core::{KflowTable, TableRows};

use super::open_database;
use crate::GlobalOptions;

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Table to show (KFLOW_GRAPH, KFLOW_NODE, KFLOW_EDGE or graph/node/edge)
    #[arg(long, short = 't', default_value = "KFLOW_GRAPH")]
    table: String,

    /// Number of rows to show
    #[arg(long, short = 'n', default_value_t = 20)]
    number: usize,
}

/// Execute the query command
pub fn execute(args: QueryArgs, config: &KflowConfig, _global: &GlobalOptions) -> Result<()> {
    let table: KflowTable = args.table.parse()?;
    let conn = open_database(config)?;
    let rows = conn
        .rows(table, Some(args.number))
        .with_context(|| format!("Failed to query {}", table))?;

    if rows.rows.is_empty() {
        println!("no record found in {}", table);
        return Ok(());
    }

    for line in format_rows(&rows) {
        println!("{}", line);
    }
    Ok(())
}

/// Render each row as space-separated `COLUMN:'value'` pairs.
fn format_rows(rows: &TableRows) -> Vec<String> {
    rows.rows
        .iter()
        .map(|row| {
            rows.columns
                .iter()
                .zip(row)
                .map(|(column, value)| format!("{}:'{}'", column, value.escape_debug()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
