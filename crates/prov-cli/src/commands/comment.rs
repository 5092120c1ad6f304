use std::error::Error;
use std::fs;

use clap::Args;
use prov_store::{RecordStore, LAST_LABEL};

use crate::project::Project;

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// `[LABEL] COMMENT`; without a label the most recent record is used.
    #[arg(num_args = 1..=2, required = true, value_names = ["LABEL", "COMMENT"])]
    pub args: Vec<String>,
    /// Replace the existing comment instead of appending to it.
    #[arg(short = 'r', long)]
    pub replace: bool,
    /// COMMENT names a file whose contents become the comment.
    #[arg(short = 'f', long)]
    pub file: bool,
}

/// Splits `[LABEL] COMMENT` into its parts.
fn split_args(args: &[String]) -> (&str, &str) {
    match args {
        [label, comment] => (label.as_str(), comment.as_str()),
        [comment] => (LAST_LABEL, comment.as_str()),
        _ => (LAST_LABEL, ""),
    }
}

fn merged(existing: Option<&str>, comment: &str, replace: bool) -> String {
    match existing {
        Some(existing) if !replace && !existing.is_empty() => format!("{existing}\n{comment}"),
        _ => comment.to_string(),
    }
}

pub fn run(args: &CommentArgs) -> Result<(), Box<dyn Error>> {
    let (label, comment) = split_args(&args.args);
    let comment = if args.file {
        fs::read_to_string(comment)?
    } else {
        comment.to_string()
    };
    let project = Project::locate()?;
    let mut store = project.store()?;
    let label = store.resolve_label(label)?;
    let annotations = store.annotations(&label)?;
    let outcome = merged(annotations.outcome.as_deref(), comment.trim(), args.replace);
    store.set_outcome(&label, &outcome)?;
    Ok(())
}
