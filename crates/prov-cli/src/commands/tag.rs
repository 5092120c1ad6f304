use std::error::Error;

use clap::Args;
use prov_store::{RecordStore, LAST_LABEL};

use crate::project::Project;

#[derive(Args, Debug)]
pub struct TagArgs {
    pub tag: String,
    /// Records to tag; defaults to the most recent one.
    pub labels: Vec<String>,
    /// Remove the tag instead of adding it.
    #[arg(short = 'r', long)]
    pub remove: bool,
}

pub fn run(args: &TagArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    let mut store = project.store()?;
    let requested = if args.labels.is_empty() {
        vec![LAST_LABEL.to_string()]
    } else {
        args.labels.clone()
    };
    for name in &requested {
        let label = store.resolve_label(name)?;
        if args.remove {
            store.remove_tag(&label, &args.tag)?;
        } else {
            store.add_tag(&label, &args.tag)?;
        }
    }
    Ok(())
}
