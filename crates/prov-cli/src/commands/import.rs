use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use prov_store::import_json;

use crate::project::Project;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file written by `prov export`.
    pub path: PathBuf,
}

pub fn run(args: &ImportArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    let mut store = project.store()?;
    let summary = import_json(store.as_mut(), &args.path)?;
    println!(
        "Imported {} records ({} already present)",
        summary.imported.len(),
        summary.unchanged.len()
    );
    if !summary.collisions.is_empty() {
        return Err(format!(
            "records differing from the stored ones were skipped: {}",
            summary.collisions.join(", ")
        )
        .into());
    }
    Ok(())
}
