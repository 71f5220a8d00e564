//! Stat command - row counts per table

use anyhow::Result;
use clap::Args;
use kflow_config::KflowConfig;
use kflow_core::{KflowTable, StoreConnection};
use tracing::warn;

use super::open_database;
use crate::GlobalOptions;

/// Arguments for the stat command
#[derive(Args, Debug)]
pub struct StatArgs {}

/// Execute the stat command
pub fn execute(_args: StatArgs, config: &KflowConfig, _global: &GlobalOptions) -> Result<()> {
    let conn = open_database(config)?;

    for line in stat_lines(&conn)? {
        println!("{}", line);
    }
    Ok(())
}

/// One `<TABLE> total: <n>` line per kflow table present in the database.
fn stat_lines(conn: &StoreConnection) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for name in conn.tables()? {
        let count = name
            .parse::<KflowTable>()
            .and_then(|table| conn.count(table));
        match count {
            Ok(n) => lines.push(format!("{} total: {}", name, n)),
            Err(e) => {
                warn!("Cannot count {}: {}", name, e);
                lines.push(format!("{} total: unavailable", name));
            }
        }
    }
    Ok(lines)
}
