//! `memovox history` — list, delete, or clear saved transcriptions.

use anyhow::{bail, Result};
use clap::Args;
use console::style;
use memovox_core::HistoryStore;

#[derive(Args)]
pub struct HistoryArgs {
    /// Delete one record by id
    #[arg(long, value_name = "ID", conflicts_with = "clear")]
    pub delete: Option<String>,

    /// Delete all records
    #[arg(long)]
    pub clear: bool,
}

pub fn run(args: HistoryArgs) -> Result<()> {
    let store = HistoryStore::open_default()?;

    if let Some(id) = args.delete {
        if store.delete(&id)? {
            println!("Deleted {id}");
        } else {
            bail!("No record with id '{id}'");
        }
        return Ok(());
    }

    if args.clear {
        store.clear()?;
        println!("History cleared.");
        return Ok(());
    }

    let records = store.list();
    if records.is_empty() {
        println!("No saved transcriptions yet.");
        println!("Run {} and finish a recording to create one.", style("memovox record").bold());
        return Ok(());
    }

    for record in records {
        println!(
            "{}  {}",
            style(&record.date).dim(),
            style(&record.id).dim()
        );
        println!("  {}", record.text);
    }
    Ok(())
}
