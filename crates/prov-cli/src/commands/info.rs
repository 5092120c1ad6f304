use std::error::Error;

use clap::Args;
use prov_store::RecordStore;

use crate::project::Project;

#[derive(Args, Debug)]
pub struct InfoArgs {}

pub fn run(_args: &InfoArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    println!("{}", project.config.describe(&project.root));
    let store = project.store()?;
    println!("Records             : {} ({} backend)", store.labels()?.len(), store.backend());
    Ok(())
}
