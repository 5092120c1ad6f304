use std::collections::BTreeMap;
use std::error::Error;
use std::process::Command;

use clap::Args;
use prov_core::{to_canonical_json_bytes, SchemaVersion, VcsKind};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Emit extended metadata including the schema and backend client versions.
    #[arg(long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct VersionInfo {
    version: String,
    record_schema: SchemaVersion,
    backends: BTreeMap<String, String>,
}

pub fn run(args: &VersionArgs) -> Result<(), Box<dyn Error>> {
    if !args.long {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let info = gather_info();
    let json = to_canonical_json_bytes(&info)?;
    println!("{}", String::from_utf8(json)?);
    Ok(())
}

fn client_version(kind: VcsKind) -> String {
    Command::new(kind.as_str())
        .arg("--version")
        .output()
        .ok()
        .and_then(|out| {
            if out.status.success() {
                String::from_utf8_lossy(&out.stdout).lines().next().map(|line| line.trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unavailable".into())
}

fn gather_info() -> VersionInfo {
    let backends = VcsKind::VERSIONED
        .iter()
        .map(|kind| (kind.to_string(), client_version(*kind)))
        .collect();
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").into(),
        record_schema: SchemaVersion::CURRENT,
        backends,
    }
}
