use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use prov_capture::PROJECT_DIR;
use prov_store::export_json;

use crate::project::Project;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination file; defaults to `.prov/records_export.json`.
    pub path: Option<PathBuf>,
}

pub fn run(args: &ExportArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    let store = project.store()?;
    let path = args
        .path
        .clone()
        .unwrap_or_else(|| project.root.join(PROJECT_DIR).join("records_export.json"));
    let count = export_json(store.as_ref(), &path)?;
    println!("Exported {count} records to {}", path.display());
    Ok(())
}
