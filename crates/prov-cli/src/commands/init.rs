use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use prov_capture::{default_archive, AddLabel, OnChanged, ProjectConfig};
use prov_core::VcsKind;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Name of the project.
    pub name: String,
    /// Directory the program writes its output files to.
    #[arg(short = 'd', long, default_value = "Data")]
    pub datapath: PathBuf,
    /// Directory input data files are read from.
    #[arg(short = 'i', long, default_value = ".")]
    pub input: PathBuf,
    /// Default executable for `prov run`.
    #[arg(short = 'e', long)]
    pub executable: Option<String>,
    /// Default main file passed to the executable.
    #[arg(short = 'm', long = "main")]
    pub main_file: Option<String>,
    /// What to do when the working copy has uncommitted changes.
    #[arg(short = 'c', long, default_value = "error")]
    pub on_changed: OnChanged,
    /// Record store; `.db` files use SQLite, other paths a directory of JSON files.
    #[arg(short = 's', long)]
    pub store: Option<PathBuf>,
    /// Force a version control backend (git, hg, svn, bzr or none).
    #[arg(long)]
    pub vcs: Option<VcsKind>,
    /// Commit uncommitted changes automatically before each run.
    #[arg(long)]
    pub auto_commit: bool,
    /// Pass each record's label to the program (cmdline or parameters).
    #[arg(short = 'l', long = "addlabel", value_name = "WHERE")]
    pub add_label: Option<AddLabel>,
    /// Copy output files into this directory after each run; `true` uses
    /// `.prov/archive`.
    #[arg(short = 'A', long, value_name = "PATH")]
    pub archive: Option<String>,
}

/// Archive setting from the command line; `false` switches archiving off.
pub(crate) fn archive_setting(value: &str) -> Option<PathBuf> {
    match value.trim().to_ascii_lowercase().as_str() {
        "false" => None,
        "true" => Some(default_archive()),
        _ => Some(PathBuf::from(value)),
    }
}

pub fn run(args: &InitArgs) -> Result<(), Box<dyn Error>> {
    let root = env::current_dir()?;
    if let Some(existing) = ProjectConfig::discover(&root) {
        if existing == root {
            return Err(format!("a prov project already exists in {}", root.display()).into());
        }
        tracing::warn!(parent = %existing.display(), "creating a project nested inside another one");
    }

    let mut config = ProjectConfig::new(args.name.clone());
    config.data_path = args.datapath.clone();
    config.input_path = args.input.clone();
    config.executable = args.executable.clone();
    config.main_file = args.main_file.clone();
    config.on_changed = args.on_changed;
    config.auto_commit = args.auto_commit;
    config.vcs = args.vcs;
    config.add_label = args.add_label;
    config.archive = args.archive.as_deref().and_then(archive_setting);
    if let Some(store) = &args.store {
        config.store = store.clone();
    }
    config.validate()?;
    config.save(&root)?;
    fs::create_dir_all(config.data_root(&root))?;

    println!("Initialized prov project '{}' in {}", config.name, root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_setting_accepts_switches_and_paths() {
        assert_eq!(archive_setting("true"), Some(default_archive()));
        assert_eq!(archive_setting("False"), None);
        assert_eq!(archive_setting("results/archive"), Some(PathBuf::from("results/archive")));
    }
}
