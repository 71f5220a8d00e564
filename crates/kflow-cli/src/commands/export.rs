//! Export command - write tables to CSV

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use kflow_config::KflowConfig;
use kflow_core::{KflowTable, StoreConnection, TableRows};
use tracing::{info, warn};

use super::{open_database, print_info};
use crate::GlobalOptions;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Table to export, or "all" for every kflow table
    #[arg(long, short = 't', default_value = "all")]
    table: String,

    /// Directory the CSV files are written to
    #[arg(long, default_value = ".")]
    dir: PathBuf,
}

/// Execute the export command
pub fn execute(args: ExportArgs, config: &KflowConfig, global: &GlobalOptions) -> Result<()> {
    let conn = open_database(config)?;
    let tables = select_tables(&conn, &args.table)?;

    std::fs::create_dir_all(&args.dir)
        .with_context(|| format!("Failed to create {}", args.dir.display()))?;

    for table in tables {
        let path = args.dir.join(format!("{}.csv", table));
        let rows = conn
            .rows(table, None)
            .with_context(|| format!("Failed to read {}", table))?;
        let count = write_csv(&path, &rows)?;

        info!("Exported {} [{}] to {}", table, count, path.display());
        print_info(
            &format!("export {} done! [{}] -> {}", table, count, path.display()),
            global.quiet,
        );
    }
    Ok(())
}

/// Resolve the `--table` argument against the tables present in the database.
fn select_tables(conn: &StoreConnection, selector: &str) -> Result<Vec<KflowTable>> {
    let present = conn.tables()?;

    if selector.eq_ignore_ascii_case("all") {
        let mut tables = Vec::new();
        for name in present {
            match name.parse::<KflowTable>() {
                Ok(table) => tables.push(table),
                Err(_) => warn!("Skipping unrecognised table {}", name),
            }
        }
        return Ok(tables);
    }

    let table: KflowTable = selector.parse()?;
    if !present.iter().any(|name| name == table.as_str()) {
        anyhow::bail!("no table named {} found", table);
    }
    Ok(vec![table])
}

/// Write a header row plus every data row; returns the data row count.
fn write_csv(path: &Path, rows: &TableRows) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(&rows.columns)?;
    for row in &rows.rows {
        writer.write_record(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(rows.rows.len())
}
