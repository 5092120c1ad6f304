use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use prov_capture::{AddLabel, OnChanged};
use prov_core::{VcsKind, WhitespacePolicy};

use crate::commands::init::archive_setting;
use crate::project::Project;

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    #[arg(short = 'd', long)]
    pub datapath: Option<PathBuf>,
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,
    #[arg(short = 'e', long)]
    pub executable: Option<String>,
    #[arg(short = 'm', long = "main")]
    pub main_file: Option<String>,
    #[arg(short = 'c', long)]
    pub on_changed: Option<OnChanged>,
    #[arg(short = 's', long)]
    pub store: Option<PathBuf>,
    #[arg(long)]
    pub vcs: Option<VcsKind>,
    /// Clear a forced backend and detect the working copy again.
    #[arg(long, conflicts_with = "vcs")]
    pub detect_vcs: bool,
    #[arg(long)]
    pub auto_commit: Option<bool>,
    /// Whether whitespace-only edits count as changes.
    #[arg(long)]
    pub whitespace: Option<WhitespacePolicy>,
    /// Pass each record's label to the program (cmdline or parameters).
    #[arg(short = 'l', long = "addlabel", value_name = "WHERE")]
    pub add_label: Option<AddLabel>,
    /// Stop passing the label to the program.
    #[arg(long, conflicts_with = "add_label")]
    pub no_addlabel: bool,
    /// Archive directory for output files; `true` for `.prov/archive`,
    /// `false` to stop archiving.
    #[arg(short = 'A', long, value_name = "PATH")]
    pub archive: Option<String>,
}

pub fn run(args: &ConfigureArgs) -> Result<(), Box<dyn Error>> {
    let Project { root, mut config } = Project::locate()?;
    if let Some(datapath) = &args.datapath {
        config.data_path = datapath.clone();
    }
    if let Some(input) = &args.input {
        config.input_path = input.clone();
    }
    if let Some(executable) = &args.executable {
        config.executable = Some(executable.clone());
    }
    if let Some(main_file) = &args.main_file {
        config.main_file = Some(main_file.clone());
    }
    if let Some(on_changed) = args.on_changed {
        config.on_changed = on_changed;
    }
    if let Some(store) = &args.store {
        config.store = store.clone();
    }
    if let Some(vcs) = args.vcs {
        config.vcs = Some(vcs);
    }
    if args.detect_vcs {
        config.vcs = None;
    }
    if let Some(auto_commit) = args.auto_commit {
        config.auto_commit = auto_commit;
    }
    if let Some(whitespace) = args.whitespace {
        config.whitespace = whitespace;
    }
    if args.add_label.is_some() || args.no_addlabel {
        config.add_label = args.add_label;
    }
    if let Some(archive) = &args.archive {
        config.archive = archive_setting(archive);
    }
    config.validate()?;
    config.save(&root)?;
    println!("{}", config.describe(&root));
    Ok(())
}
