//! Flag merging for one task invocation.

use synctide_core::config::{FlagSet, RunEnvironment, SyncMode};

use crate::filters::FilterArg;

/// Merge the flag layers for one task.
///
/// Order is load-bearing: the external tool gives later-listed filters
/// precedence, and per-task extras must be able to override the shared
/// layers. Always `base`, mode array, environment array, filters, extras.
pub fn merge_flags(
    flags: &FlagSet,
    mode: SyncMode,
    environment: RunEnvironment,
    filters: &[FilterArg],
    extra: &[String],
) -> Vec<String> {
    let mut merged = Vec::new();
    merged.extend(flags.base.iter().cloned());
    merged.extend(flags.for_mode(mode).iter().cloned());
    merged.extend(flags.for_environment(environment).iter().cloned());
    for filter in filters {
        merged.extend(filter.to_args());
    }
    merged.extend(extra.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn strs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample_flags() -> FlagSet {
        FlagSet {
            base: strs(&["--progress", "--transfers", "4"]),
            bisync: strs(&["--resilient"]),
            backup: strs(&["--delete-excluded"]),
            terminal: strs(&["--interactive"]),
            systemd: strs(&["--log-level", "INFO"]),
        }
    }

    #[test]
    fn merge_order_is_base_mode_environment_filters_extras() {
        let filters = vec![
            FilterArg {
                path: PathBuf::from("/w/filters.bisync.txt"),
            },
            FilterArg {
                path: PathBuf::from("/w/filters.bisync.docs.txt"),
            },
        ];
        let extra = strs(&["--dry-run"]);

        let merged = merge_flags(
            &sample_flags(),
            SyncMode::Bisync,
            RunEnvironment::Service,
            &filters,
            &extra,
        );

        assert_eq!(
            merged,
            strs(&[
                "--progress",
                "--transfers",
                "4",
                "--resilient",
                "--log-level",
                "INFO",
                "--filter-from",
                "/w/filters.bisync.txt",
                "--filter-from",
                "/w/filters.bisync.docs.txt",
                "--dry-run",
            ])
        );
    }

    #[test]
    fn backup_mode_selects_the_backup_array() {
        let merged = merge_flags(
            &sample_flags(),
            SyncMode::Backup,
            RunEnvironment::Terminal,
            &[],
            &[],
        );
        assert_eq!(
            merged,
            strs(&["--progress", "--transfers", "4", "--delete-excluded", "--interactive"])
        );
    }

    #[test]
    fn empty_layers_contribute_nothing() {
        let merged = merge_flags(
            &FlagSet::default(),
            SyncMode::Bisync,
            RunEnvironment::Terminal,
            &[],
            &[],
        );
        assert!(merged.is_empty());
    }
}
