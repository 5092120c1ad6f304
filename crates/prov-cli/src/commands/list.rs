use std::error::Error;

use clap::Args;
use prov_store::RecordStore;

use crate::project::Project;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list records carrying all of these tags.
    pub tags: Vec<String>,
    /// One block per record with its reason, status and annotations.
    #[arg(short = 'l', long, conflicts_with = "table")]
    pub long: bool,
    /// Tab-separated columns with a header row.
    #[arg(short = 'T', long)]
    pub table: bool,
}

const TABLE_HEADER: [&str; 8] = [
    "label", "timestamp", "reason", "outcome", "duration", "status", "revision", "tags",
];

/// Field text with the separators of the table format flattened to spaces.
fn cell(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

pub fn run(args: &ListArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    let store = project.store()?;
    print!("{}", render(store.as_ref(), args)?);
    Ok(())
}

fn render(store: &dyn RecordStore, args: &ListArgs) -> Result<String, Box<dyn Error>> {
    let mut out = String::new();
    if args.table {
        out.push_str(&TABLE_HEADER.join("\t"));
        out.push('\n');
    }
    for record in store.list()? {
        let annotations = store.annotations(record.label())?;
        if !args.tags.iter().all(|tag| annotations.tags.contains(tag)) {
            continue;
        }
        let tags: Vec<&str> = annotations.tags.iter().map(String::as_str).collect();
        if args.table {
            let row = [
                cell(record.label()),
                record.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
                cell(record.reason().unwrap_or("")),
                cell(annotations.outcome.as_deref().unwrap_or("")),
                format!("{:.2}", record.duration().as_secs_f64()),
                record.exit_status().to_string(),
                record.code_identity().revision_id().unwrap_or("").to_string(),
                cell(&tags.join(",")),
            ];
            out.push_str(&row.join("\t"));
            out.push('\n');
            continue;
        }
        if !args.long {
            out.push_str(record.label());
            out.push('\n');
            continue;
        }
        let identity = record.code_identity();
        let revision = identity.revision_id().unwrap_or("(unversioned)");
        out.push_str(&format!("{}\n", "-".repeat(60)));
        out.push_str(&format!("Label      : {}\n", record.label()));
        out.push_str(&format!("Timestamp  : {}\n", record.timestamp().format("%Y-%m-%d %H:%M:%S UTC")));
        out.push_str(&format!("Reason     : {}\n", record.reason().unwrap_or("")));
        out.push_str(&format!("Command    : {}\n", record.command()));
        let modified = if identity.dirty() { " (modified)" } else { "" };
        out.push_str(&format!("Code       : {} {revision}{modified}\n", identity.vcs_type()));
        out.push_str(&format!("Status     : {}\n", record.exit_status()));
        out.push_str(&format!("Outputs    : {}\n", record.outputs().len()));
        if let Some(repeats) = record.repeats() {
            out.push_str(&format!("Repeats    : {repeats}\n"));
        }
        out.push_str(&format!("Tags       : {}\n", tags.join(", ")));
        if let Some(outcome) = &annotations.outcome {
            out.push_str(&format!("Outcome    : {}\n", outcome.replace('\n', "\n             ")));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use prov_core::CodeIdentity;
    use prov_record::{CommandLine, ExitStatus, RecordDraft};
    use prov_store::SqliteRecordStore;

    use super::*;

    fn save(store: &mut dyn RecordStore, label: &str, minute: u32) {
        let timestamp = Utc.with_ymd_and_hms(2024, 9, 14, 16, minute, 0).single().expect("timestamp");
        let mut draft = RecordDraft::new(label, timestamp, "/work");
        draft.command = CommandLine::new("python").with_main_file("main.py");
        draft.code_identity = Some(CodeIdentity::unversioned("/work"));
        draft.exit_status = ExitStatus::Success;
        store.save(&draft.seal().expect("seal")).expect("save");
    }

    #[test]
    fn filters_by_every_requested_tag() {
        let mut store = SqliteRecordStore::in_memory().expect("store");
        save(&mut store, "first", 1);
        save(&mut store, "second", 2);
        store.add_tag("first", "baseline").expect("tag");
        store.add_tag("second", "baseline").expect("tag");
        store.add_tag("second", "final").expect("tag");

        let all = ListArgs {
            tags: Vec::new(),
            long: false,
            table: false,
        };
        assert_eq!(render(&store, &all).expect("render"), "first\nsecond\n");
        let tagged = ListArgs {
            tags: vec!["baseline".to_string(), "final".to_string()],
            long: false,
            table: false,
        };
        assert_eq!(render(&store, &tagged).expect("render"), "second\n");
    }

    #[test]
    fn long_listing_shows_annotations() {
        let mut store = SqliteRecordStore::in_memory().expect("store");
        save(&mut store, "first", 1);
        store.set_outcome("first", "looks good").expect("outcome");
        let long = ListArgs {
            tags: Vec::new(),
            long: true,
            table: false,
        };
        let text = render(&store, &long).expect("render");
        assert!(text.contains("Label      : first"));
        assert!(text.contains("Command    : python main.py"));
        assert!(text.contains("Outcome    : looks good"));
    }

    #[test]
    fn table_listing_is_tab_separated() {
        let mut store = SqliteRecordStore::in_memory().expect("store");
        save(&mut store, "first", 1);
        store.set_outcome("first", "two\nlines").expect("outcome");
        store.add_tag("first", "baseline").expect("tag");
        let table = ListArgs {
            tags: Vec::new(),
            long: false,
            table: true,
        };
        let text = render(&store, &table).expect("render");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], TABLE_HEADER.join("\t"));
        let fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(fields.len(), TABLE_HEADER.len());
        assert_eq!(fields[0], "first");
        assert_eq!(fields[1], "2024-09-14 16:01:00");
        assert_eq!(fields[3], "two lines");
        assert_eq!(fields[5], "success");
        assert_eq!(fields[7], "baseline");
    }
}
