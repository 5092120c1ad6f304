use std::fs;
use std::path::Path;

/// Renders an untracked file as a new-file hunk so it shows up in the
/// working-copy diff alongside tracked modifications.
pub fn new_file_patch(root: &Path, relative: &Path) -> String {
    let shown = relative.to_string_lossy().replace('\\', "/");
    let bytes = match fs::read(root.join(relative)) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(path = %shown, error = %err, "untracked file unreadable");
            return format!("Binary file b/{shown} added\n");
        }
    };
    if bytes.contains(&0) {
        return format!("Binary file b/{shown} added\n");
    }
    let Ok(text) = String::from_utf8(bytes) else {
        return format!("Binary file b/{shown} added\n");
    };

    let mut patch = format!("--- /dev/null\n+++ b/{shown}\n");
    if text.is_empty() {
        return patch;
    }
    let lines: Vec<&str> = text.lines().collect();
    patch.push_str(&format!("@@ -0,0 +1,{} @@\n", lines.len()));
    for line in &lines {
        patch.push('+');
        patch.push_str(line);
        patch.push('\n');
    }
    if !text.ends_with('\n') {
        patch.push_str("\\ No newline at end of file\n");
    }
    patch
}
