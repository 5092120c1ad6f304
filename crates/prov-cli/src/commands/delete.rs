use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::io;

use clap::Args;
use prov_core::errors::ProvError;
use prov_store::RecordStore;

use crate::project::Project;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Labels to delete; `last` for the most recent record.
    #[arg(required = true)]
    pub labels: Vec<String>,
    /// Treat the arguments as tags and delete every record carrying them.
    #[arg(short = 'T', long)]
    pub tag: bool,
    /// Also delete the output files of the deleted records.
    #[arg(short = 'd', long)]
    pub data: bool,
}

/// Labels to delete. Unknown labels are reported and skipped.
fn selected(store: &dyn RecordStore, args: &DeleteArgs) -> Result<BTreeSet<String>, Box<dyn Error>> {
    let mut labels = BTreeSet::new();
    for name in &args.labels {
        if args.tag {
            labels.extend(store.labels_with_tag(name)?);
            continue;
        }
        let label = match store.resolve_label(name) {
            Ok(label) => label,
            Err(ProvError::NotFound(_)) => {
                eprintln!("warning: no record to delete for '{name}'");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        if store.contains(&label)? {
            labels.insert(label);
        } else {
            eprintln!("warning: no record labelled '{label}', skipping");
        }
    }
    Ok(labels)
}

pub fn run(args: &DeleteArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    let data_root = project.config.data_root(&project.root);
    let mut store = project.store()?;
    let labels = selected(store.as_ref(), args)?;
    if labels.is_empty() {
        println!("No records matched.");
        return Ok(());
    }
    for label in &labels {
        if args.data {
            let record = store.get(label)?;
            for output in record.outputs() {
                match fs::remove_file(data_root.join(&output.path)) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        store.delete(label)?;
        println!("Deleted {label}");
    }
    Ok(())
}
