use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use prov_store::{open_store, sync, RecordStore};

use crate::project::Project;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// A record store; alone, it is synchronized with the project store.
    pub store1: PathBuf,
    /// A second record store to synchronize with the first.
    pub store2: Option<PathBuf>,
}

pub fn run(args: &SyncArgs) -> Result<(), Box<dyn Error>> {
    let mut left: Box<dyn RecordStore> = match &args.store2 {
        Some(_) => open_store(&args.store1)?,
        None => Project::locate()?.store()?,
    };
    let right_path = args.store2.as_ref().unwrap_or(&args.store1);
    let mut right = open_store(right_path)?;

    let report = sync(left.as_mut(), right.as_mut())?;
    if report.is_noop() {
        println!("Stores are already in sync.");
        return Ok(());
    }
    println!(
        "Copied {} records into the first store and {} into the second",
        report.copied_to_left.len(),
        report.copied_to_right.len()
    );
    if !report.collisions.is_empty() {
        return Err(format!(
            "labels exist in both stores with different content: {}",
            report.collisions.join(", ")
        )
        .into());
    }
    Ok(())
}
