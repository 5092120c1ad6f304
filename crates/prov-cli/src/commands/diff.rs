use std::error::Error;

use clap::Args;
use prov_record::{CompareOptions, Dimension, DiffFormatter, RecordComparator};
use prov_store::RecordStore;

use crate::project::Project;

#[derive(Args, Debug)]
pub struct DiffArgs {
    pub label1: String,
    pub label2: String,
    /// Show every differing key with both values.
    #[arg(short = 'L', long)]
    pub long: bool,
    /// Output paths matching this regular expression are left out of the
    /// comparison. May be repeated.
    #[arg(short = 'i', long = "ignore", value_name = "REGEX")]
    pub ignore: Vec<String>,
    /// Compare only these dimensions.
    #[arg(short = 'd', long = "dimension")]
    pub dimensions: Vec<Dimension>,
}

pub fn run(args: &DiffArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    let store = project.store()?;
    let left = store.get(&store.resolve_label(&args.label1)?)?;
    let right = store.get(&store.resolve_label(&args.label2)?)?;

    let mut options = CompareOptions {
        whitespace: project.config.whitespace,
        ignore_outputs: args.ignore.clone(),
        ..CompareOptions::default()
    };
    if !args.dimensions.is_empty() {
        options.dimensions = args.dimensions.clone();
    }
    let report = RecordComparator::new(options)?.compare(&left, &right);
    let formatter = if args.long { DiffFormatter::Long } else { DiffFormatter::Short };
    print!("{}", formatter.render(&report));
    Ok(())
}
