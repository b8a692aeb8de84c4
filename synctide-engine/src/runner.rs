//! The run orchestrator: gate, lock, task iteration, cleanup.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use synctide_core::config::{Config, FlagSet, RunEnvironment, SyncMode, TaskName, TaskSpec};
use synctide_core::paths;

use crate::cancel::CancelFlag;
use crate::error::{io_err, EngineError};
use crate::executor::{Executor, SyncExecutor};
use crate::filters::FilterResolver;
use crate::flags::merge_flags;
use crate::lock::RunLock;
use crate::net::{PingProbe, Probe};

/// Tallies for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Terminal states of a run that did not error.
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every eligible task was attempted.
    Completed(RunReport),
    /// Another instance holds the lock; nothing was attempted.
    SkippedLockHeld,
}

/// Executes all configured tasks in declared order, one at a time.
///
/// Tasks run strictly sequentially so bandwidth contention stays bounded
/// and the streamed log output remains attributable to one task.
pub struct Runner<E = SyncExecutor, P = PingProbe> {
    config: Config,
    flags: FlagSet,
    filters: FilterResolver,
    home: PathBuf,
    lock_dir: PathBuf,
    environment: RunEnvironment,
    cancel: Arc<CancelFlag>,
    executor: E,
    probe: P,
}

impl Runner<SyncExecutor, PingProbe> {
    pub fn new(
        config: Config,
        flags: FlagSet,
        root: &Path,
        home: &Path,
        environment: RunEnvironment,
        cancel: Arc<CancelFlag>,
    ) -> Self {
        Runner {
            config,
            flags,
            filters: FilterResolver::new(root),
            home: home.to_path_buf(),
            lock_dir: paths::lock_dir(&paths::current_user()),
            environment,
            cancel: cancel.clone(),
            executor: SyncExecutor::new(cancel),
            probe: PingProbe,
        }
    }
}

impl<E: Executor, P: Probe> Runner<E, P> {
    /// Replace the subprocess layer.
    pub fn with_executor<E2: Executor>(self, executor: E2) -> Runner<E2, P> {
        Runner {
            config: self.config,
            flags: self.flags,
            filters: self.filters,
            home: self.home,
            lock_dir: self.lock_dir,
            environment: self.environment,
            cancel: self.cancel,
            executor,
            probe: self.probe,
        }
    }

    /// Replace the reachability probe.
    pub fn with_probe<P2: Probe>(self, probe: P2) -> Runner<E, P2> {
        Runner {
            config: self.config,
            flags: self.flags,
            filters: self.filters,
            home: self.home,
            lock_dir: self.lock_dir,
            environment: self.environment,
            cancel: self.cancel,
            executor: self.executor,
            probe,
        }
    }

    /// Use a different lock directory.
    pub fn with_lock_dir(mut self, dir: PathBuf) -> Self {
        self.lock_dir = dir;
        self
    }

    /// Probe connectivity, take the run lock, iterate tasks, release the
    /// lock. The guard is held across the whole loop and dropped on every
    /// exit path, including per-task failures and cancellation.
    pub fn run(&self) -> Result<RunOutcome, EngineError> {
        if !self.probe.is_reachable() {
            error!("no network connection; skipping sync run");
            return Err(EngineError::Offline);
        }

        let Some(_lock) = RunLock::acquire(self.lock_dir.clone())
            .map_err(|e| io_err(&self.lock_dir, e))?
        else {
            info!("another instance is already running; nothing to do");
            return Ok(RunOutcome::SkippedLockHeld);
        };

        let mut report = RunReport::default();
        for (mode, tasks) in &self.config.tasks {
            for (name, spec) in tasks {
                if self.cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                self.run_task(*mode, name, spec, &mut report)?;
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "run complete"
        );
        Ok(RunOutcome::Completed(report))
    }

    /// One task's failure never aborts its siblings; only cancellation
    /// propagates.
    fn run_task(
        &self,
        mode: SyncMode,
        name: &TaskName,
        spec: &TaskSpec,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        if spec.disabled {
            info!("skipping disabled task: {name} ({mode})");
            report.skipped += 1;
            return Ok(());
        }

        let src = self.resolve_local(&spec.src);
        let dst = self.resolve_destination(&spec.dst);
        let filter_chain = self.filters.resolve(mode, name);
        let merged = merge_flags(
            &self.flags,
            mode,
            self.environment,
            &filter_chain,
            &spec.extra_flags,
        );

        match self.executor.run(mode, &src, &dst, &merged) {
            Ok(0) => report.succeeded += 1,
            Ok(_) => report.failed += 1,
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => {
                error!("task {name} ({mode}) could not run: {err}");
                report.failed += 1;
            }
        }
        Ok(())
    }

    /// Expand `~` and canonicalize. A path that does not exist yet is
    /// absolutized lexically instead.
    fn resolve_local(&self, raw: &str) -> String {
        let expanded = expand_tilde(raw, &self.home);
        let resolved = fs::canonicalize(&expanded)
            .or_else(|_| std::path::absolute(&expanded))
            .unwrap_or(expanded);
        resolved.display().to_string()
    }

    /// A `:` marks a remote address; remote destinations pass through
    /// verbatim.
    fn resolve_destination(&self, raw: &str) -> String {
        if raw.contains(':') {
            raw.to_string()
        } else {
            self.resolve_local(raw)
        }
    }
}

fn expand_tilde(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Invocation {
        mode: SyncMode,
        src: String,
        dst: String,
        flags: Vec<String>,
    }

    #[derive(Default)]
    struct RecorderInner {
        calls: Mutex<Vec<Invocation>>,
        outcomes: Mutex<VecDeque<Result<i32, EngineError>>>,
    }

    /// Records invocations; pops scripted outcomes, defaulting to exit 0.
    #[derive(Clone, Default)]
    struct RecordingExecutor(Arc<RecorderInner>);

    impl RecordingExecutor {
        fn scripted(outcomes: Vec<Result<i32, EngineError>>) -> Self {
            let rec = Self::default();
            *rec.0.outcomes.lock().unwrap() = outcomes.into();
            rec
        }

        fn calls(&self) -> Vec<Invocation> {
            self.0.calls.lock().unwrap().clone()
        }
    }

    impl Executor for RecordingExecutor {
        fn run(
            &self,
            mode: SyncMode,
            src: &str,
            dst: &str,
            flags: &[String],
        ) -> Result<i32, EngineError> {
            self.0.calls.lock().unwrap().push(Invocation {
                mode,
                src: src.to_string(),
                dst: dst.to_string(),
                flags: flags.to_vec(),
            });
            self.0.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(0))
        }
    }

    struct StaticProbe(bool);

    impl Probe for StaticProbe {
        fn is_reachable(&self) -> bool {
            self.0
        }
    }

    struct Fixture {
        home: TempDir,
        root: TempDir,
        lock: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                home: TempDir::new().expect("home"),
                root: TempDir::new().expect("root"),
                lock: TempDir::new().expect("lock"),
            }
        }

        fn lock_dir(&self) -> PathBuf {
            self.lock.path().join("lock")
        }

        fn runner(
            &self,
            config_json: &str,
            flags_json: &str,
            rec: &RecordingExecutor,
        ) -> Runner<RecordingExecutor, StaticProbe> {
            let config: Config = serde_json::from_str(config_json).expect("config");
            let flags: FlagSet = serde_json::from_str(flags_json).expect("flags");
            Runner::new(
                config,
                flags,
                self.root.path(),
                self.home.path(),
                RunEnvironment::Terminal,
                Arc::new(CancelFlag::new()),
            )
            .with_lock_dir(self.lock_dir())
            .with_executor(rec.clone())
            .with_probe(StaticProbe(true))
        }
    }

    #[test]
    fn disabled_tasks_never_reach_the_executor() {
        let fx = Fixture::new();
        let rec = RecordingExecutor::default();
        let runner = fx.runner(
            r#"{ "tasks": { "backup": {
                "off": { "src": "/a", "dst": "remote:a", "disabled": true },
                "on":  { "src": "/b", "dst": "remote:b" }
            } } }"#,
            "{}",
            &rec,
        );

        let outcome = runner.run().expect("run");
        assert_eq!(rec.calls().len(), 1);
        assert_eq!(rec.calls()[0].dst, "remote:b");
        assert_eq!(
            outcome,
            RunOutcome::Completed(RunReport {
                succeeded: 1,
                failed: 0,
                skipped: 1
            })
        );
    }

    #[test]
    fn one_failing_task_does_not_abort_its_siblings() {
        let fx = Fixture::new();
        let rec = RecordingExecutor::scripted(vec![Ok(1), Ok(0)]);
        let runner = fx.runner(
            r#"{ "tasks": { "backup": {
                "a": { "src": "/a", "dst": "remote:a" },
                "b": { "src": "/b", "dst": "remote:b" }
            } } }"#,
            "{}",
            &rec,
        );

        let outcome = runner.run().expect("run");
        assert_eq!(rec.calls().len(), 2, "second task must still be attempted");
        assert_eq!(
            outcome,
            RunOutcome::Completed(RunReport {
                succeeded: 1,
                failed: 1,
                skipped: 0
            })
        );
    }

    #[test]
    fn spawn_failures_are_isolated_like_nonzero_exits() {
        let fx = Fixture::new();
        let rec = RecordingExecutor::scripted(vec![
            Err(EngineError::Spawn {
                program: "rclone".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            Ok(0),
        ]);
        let runner = fx.runner(
            r#"{ "tasks": { "backup": {
                "a": { "src": "/a", "dst": "remote:a" },
                "b": { "src": "/b", "dst": "remote:b" }
            } } }"#,
            "{}",
            &rec,
        );

        let outcome = runner.run().expect("run");
        assert_eq!(rec.calls().len(), 2);
        assert_eq!(
            outcome,
            RunOutcome::Completed(RunReport {
                succeeded: 1,
                failed: 1,
                skipped: 0
            })
        );
    }

    #[test]
    fn tasks_run_in_declared_order_across_modes() {
        let fx = Fixture::new();
        let rec = RecordingExecutor::default();
        let runner = fx.runner(
            r#"{ "tasks": {
                "bisync": {
                    "notes": { "src": "/n", "dst": "remote:n" }
                },
                "backup": {
                    "photos": { "src": "/p", "dst": "remote:p" },
                    "docs":   { "src": "/d", "dst": "remote:d" }
                }
            } }"#,
            "{}",
            &rec,
        );

        runner.run().expect("run");
        let order: Vec<(SyncMode, String)> = rec
            .calls()
            .iter()
            .map(|call| (call.mode, call.dst.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (SyncMode::Bisync, "remote:n".to_string()),
                (SyncMode::Backup, "remote:p".to_string()),
                (SyncMode::Backup, "remote:d".to_string()),
            ]
        );
    }

    #[test]
    fn remote_destinations_pass_through_verbatim_and_sources_expand() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.home.path().join("docs")).expect("mkdir docs");
        let rec = RecordingExecutor::default();
        let runner = fx.runner(
            r#"{ "tasks": { "backup": {
                "docs": { "src": "~/docs", "dst": "remote:bucket/docs" }
            } } }"#,
            "{}",
            &rec,
        );

        runner.run().expect("run");
        let call = &rec.calls()[0];
        assert_eq!(call.dst, "remote:bucket/docs", "remote dst must not be expanded");
        let expected = fs::canonicalize(fx.home.path().join("docs")).expect("canonicalize");
        assert_eq!(call.src, expected.display().to_string());
    }

    #[test]
    fn local_destinations_are_expanded_like_sources() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.home.path().join("mirror")).expect("mkdir");
        let rec = RecordingExecutor::default();
        let runner = fx.runner(
            r#"{ "tasks": { "backup": {
                "m": { "src": "/tmp", "dst": "~/mirror" }
            } } }"#,
            "{}",
            &rec,
        );

        runner.run().expect("run");
        let expected = fs::canonicalize(fx.home.path().join("mirror")).expect("canonicalize");
        assert_eq!(rec.calls()[0].dst, expected.display().to_string());
    }

    #[test]
    fn merged_flags_follow_the_invariant_with_filters_present() {
        let fx = Fixture::new();
        fs::write(fx.root.path().join("filters.backup.txt"), "- *.tmp\n").expect("write filter");
        fs::write(fx.root.path().join("filters.backup.docs.txt"), "- drafts/**\n")
            .expect("write filter");
        let rec = RecordingExecutor::default();
        let runner = fx.runner(
            r#"{ "tasks": { "backup": {
                "docs": { "src": "/d", "dst": "remote:d", "extra_flags": ["--dry-run"] }
            } } }"#,
            r#"{ "base": ["--progress"], "backup": ["--delete-excluded"], "terminal": ["--interactive"] }"#,
            &rec,
        );

        runner.run().expect("run");
        let flags = &rec.calls()[0].flags;
        let global = fx.root.path().join("filters.backup.txt");
        let specific = fx.root.path().join("filters.backup.docs.txt");
        assert_eq!(
            flags,
            &vec![
                "--progress".to_string(),
                "--delete-excluded".to_string(),
                "--interactive".to_string(),
                "--filter-from".to_string(),
                global.display().to_string(),
                "--filter-from".to_string(),
                specific.display().to_string(),
                "--dry-run".to_string(),
            ]
        );
    }

    #[test]
    fn single_backup_task_without_filters_invokes_exactly_once() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.home.path().join("docs")).expect("mkdir");
        let rec = RecordingExecutor::default();
        let runner = fx.runner(
            r#"{ "tasks": { "backup": {
                "docs": { "src": "~/docs", "dst": "remote:bucket/docs" }
            } } }"#,
            r#"{ "base": ["--progress"], "backup": ["--delete-excluded"] }"#,
            &rec,
        );

        runner.run().expect("run");
        let calls = rec.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.mode, SyncMode::Backup);
        assert_eq!(call.dst, "remote:bucket/docs");
        assert_eq!(call.flags, vec!["--progress", "--delete-excluded"]);
    }

    #[test]
    fn failed_gate_attempts_no_tasks_and_leaves_no_lock() {
        let fx = Fixture::new();
        let rec = RecordingExecutor::default();
        let runner = fx
            .runner(
                r#"{ "tasks": { "backup": { "a": { "src": "/a", "dst": "remote:a" } } } }"#,
                "{}",
                &rec,
            )
            .with_probe(StaticProbe(false));

        let result = runner.run();
        assert!(matches!(result, Err(EngineError::Offline)));
        assert!(rec.calls().is_empty());
        assert!(!fx.lock_dir().exists(), "gate failure must not create the lock");
    }

    #[test]
    fn contended_lock_skips_the_run_with_a_clean_outcome() {
        let fx = Fixture::new();
        fs::create_dir(fx.lock_dir()).expect("simulate a concurrent holder");
        let rec = RecordingExecutor::default();
        let runner = fx.runner(
            r#"{ "tasks": { "backup": { "a": { "src": "/a", "dst": "remote:a" } } } }"#,
            "{}",
            &rec,
        );

        let outcome = runner.run().expect("run");
        assert_eq!(outcome, RunOutcome::SkippedLockHeld);
        assert!(rec.calls().is_empty(), "the losing instance must run zero tasks");
        assert!(fx.lock_dir().exists(), "the holder's lock must be left alone");
    }

    #[test]
    fn lock_is_released_after_a_run_with_failures() {
        let fx = Fixture::new();
        let rec = RecordingExecutor::scripted(vec![Ok(1)]);
        let runner = fx.runner(
            r#"{ "tasks": { "backup": { "a": { "src": "/a", "dst": "remote:a" } } } }"#,
            "{}",
            &rec,
        );

        runner.run().expect("run");
        assert!(!fx.lock_dir().exists(), "lock must be released on completion");
    }

    #[test]
    fn cancellation_aborts_remaining_tasks_and_releases_the_lock() {
        let fx = Fixture::new();
        let rec = RecordingExecutor::scripted(vec![Err(EngineError::Cancelled)]);
        let runner = fx.runner(
            r#"{ "tasks": { "backup": {
                "a": { "src": "/a", "dst": "remote:a" },
                "b": { "src": "/b", "dst": "remote:b" }
            } } }"#,
            "{}",
            &rec,
        );

        let result = runner.run();
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert_eq!(rec.calls().len(), 1, "tasks after the interrupt must not start");
        assert!(!fx.lock_dir().exists(), "lock must be released after cancellation");
    }

    #[test]
    fn expand_tilde_handles_bare_and_prefixed_forms() {
        let home = Path::new("/home/tester");
        assert_eq!(expand_tilde("~", home), PathBuf::from("/home/tester"));
        assert_eq!(expand_tilde("~/docs", home), PathBuf::from("/home/tester/docs"));
        assert_eq!(expand_tilde("/abs/path", home), PathBuf::from("/abs/path"));
    }
}
