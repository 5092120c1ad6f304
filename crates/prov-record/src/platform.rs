use std::collections::BTreeMap;
use std::env;
use std::thread;

use globset::{Glob, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Host description captured with every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub architecture: String,
    pub hostname: String,
    pub parallelism: usize,
    pub total_memory_mb: u64,
    /// Version of the capturing tool.
    pub tool_version: String,
    /// Environment variables matching the configured allow-list.
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
}

impl PlatformInfo {
    /// Describes the current host. `env_allow` holds glob patterns over
    /// variable names (`OMP_*`, `PATH`).
    pub fn capture(env_allow: &[String], tool_version: &str) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let parallelism = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            os_name: System::name().unwrap_or_default(),
            os_version: System::os_version().unwrap_or_default(),
            kernel_version: System::kernel_version().unwrap_or_default(),
            architecture: env::consts::ARCH.to_string(),
            hostname: System::host_name().unwrap_or_default(),
            parallelism,
            total_memory_mb: sys.total_memory() / 1024 / 1024,
            tool_version: tool_version.to_string(),
            environment_variables: allowed_variables(env_allow, env::vars()),
        }
    }

    /// Field name -> rendered value, environment variables as `env.NAME`.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::from([
            ("os_name".to_string(), self.os_name.clone()),
            ("os_version".to_string(), self.os_version.clone()),
            ("kernel_version".to_string(), self.kernel_version.clone()),
            ("architecture".to_string(), self.architecture.clone()),
            ("hostname".to_string(), self.hostname.clone()),
            ("parallelism".to_string(), self.parallelism.to_string()),
            ("total_memory_mb".to_string(), self.total_memory_mb.to_string()),
            ("tool_version".to_string(), self.tool_version.clone()),
        ]);
        for (name, value) in &self.environment_variables {
            fields.insert(format!("env.{name}"), value.clone());
        }
        fields
    }
}

fn allowed_variables(
    patterns: &[String],
    vars: impl Iterator<Item = (String, String)>,
) -> BTreeMap<String, String> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => tracing::warn!(pattern = %pattern, error = %err, "ignoring invalid environment pattern"),
        }
    }
    let Ok(set) = builder.build() else {
        return BTreeMap::new();
    };
    if set.is_empty() {
        return BTreeMap::new();
    }
    vars.filter(|(name, _)| set.is_match(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_filters_variables() {
        let vars = vec![
            ("OMP_NUM_THREADS".to_string(), "4".to_string()),
            ("OMP_PROC_BIND".to_string(), "close".to_string()),
            ("SECRET_TOKEN".to_string(), "xyz".to_string()),
            ("PATH".to_string(), "/bin".to_string()),
        ];
        let kept = allowed_variables(&["OMP_*".to_string(), "PATH".to_string()], vars.into_iter());
        assert_eq!(kept.len(), 3);
        assert!(!kept.contains_key("SECRET_TOKEN"));
    }

    #[test]
    fn capture_fills_host_fields() {
        let info = PlatformInfo::capture(&[], "0.1.0");
        assert!(!info.architecture.is_empty());
        assert!(info.parallelism >= 1);
        assert!(info.environment_variables.is_empty());
        assert_eq!(info.fields()["tool_version"], "0.1.0");
    }
}
