//! Logging sink: console plus a size-rotated log file under the workspace
//! root.
//!
//! Rotates `synctide.log` when it exceeds 5 MiB, keeping one rotated copy:
//!   synctide.log → synctide.log.1
//!
//! Rotation runs once, at startup, before the subscriber opens the file;
//! the process is short-lived and re-invoked by the recurring trigger, so a
//! startup check keeps the file bounded across deployments.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use synctide_core::paths::{log_path, logs_dir};

/// Maximum log file size before rotation (5 MiB).
pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

/// Maximum number of rotated backup files to keep.
pub const MAX_ROTATED_FILES: usize = 1;

/// Install the global subscriber: an ANSI console layer on stdout plus a
/// plain-text append layer on the workspace log file. Repeated calls no-op.
pub fn init(root: &Path) -> Result<()> {
    let dir = logs_dir(root);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let path = log_path(root);
    if let Err(err) = rotate_if_needed(&path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        eprintln!("warning: log rotation failed for {}: {err}", path.display());
    }

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false);
    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

/// Rotate `log_path` if its size exceeds `max_bytes`.
///
/// Rotation sequence (oldest first):
///   `<name>.<max_files>` deleted
///   `<name>.<n>` → `<name>.<n+1>` for n = max_files-1 … 1
///   `<name>` → `<name>.1`
///   Create fresh empty `<name>`.
///
/// Returns `true` if rotation occurred, `false` if the file was under the
/// threshold (or did not exist yet).
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    // Remove the oldest file so we never exceed max_files.
    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    // Shift existing rotated files up by one.
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        let dst = numbered_path(log_path, n + 1);
        if src.exists() {
            fs::rename(&src, &dst)?;
        }
    }

    // Rename live log → .1
    fs::rename(log_path, numbered_path(log_path, 1))?;

    // Create a fresh empty log file so the subscriber always has a writable
    // path.
    let _ = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Build the path for the `n`-th rotated copy of `base` (e.g.
/// `synctide.log.1`).
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(synctide_core::paths::LOG_FILE);
    base.with_file_name(format!("{name}.{n}"))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn make_log(dir: &TempDir, name: &str, size_bytes: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        // Write in 64 KiB chunks to avoid huge allocations in tests.
        let chunk = vec![b'x'; 64 * 1024];
        let mut written = 0usize;
        while written < size_bytes {
            let to_write = (size_bytes - written).min(chunk.len());
            f.write_all(&chunk[..to_write]).unwrap();
            written += to_write;
        }
        path
    }

    #[test]
    fn rotation_noop_when_file_under_threshold() {
        let dir = TempDir::new().unwrap();
        let log = make_log(&dir, "synctide.log", 1024); // 1 KiB
        let rotated = rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap();
        assert!(!rotated, "should not rotate a small file");
        assert!(!numbered_path(&log, 1).exists(), "no .1 file should exist");
    }

    #[test]
    fn rotation_triggers_when_file_exceeds_max_bytes() {
        let dir = TempDir::new().unwrap();
        let log = make_log(&dir, "synctide.log", MAX_LOG_BYTES as usize + 1);
        let rotated = rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap();
        assert!(rotated, "should rotate an oversized file");

        // Original log exists and is empty.
        let size = fs::metadata(&log).unwrap().len();
        assert_eq!(size, 0, "rotated log should be empty");

        // The rotated copy exists and has the original content.
        let backup = numbered_path(&log, 1);
        assert!(backup.exists(), "synctide.log.1 should exist");
        let backup_size = fs::metadata(&backup).unwrap().len();
        assert!(backup_size > 0, "backup should have content");
    }

    #[test]
    fn max_rotated_files_are_capped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("synctide.log");

        // Pre-fill the single allowed backup, then rotate an oversized live
        // file over it.
        fs::write(numbered_path(&log, 1), "old backup").unwrap();
        make_log(&dir, "synctide.log", MAX_LOG_BYTES as usize + 1);

        let rotated = rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap();
        assert!(rotated);

        assert!(numbered_path(&log, 1).exists());
        assert!(
            !numbered_path(&log, 2).exists(),
            "must not create more than MAX_ROTATED_FILES backup files"
        );
        let backup_size = fs::metadata(numbered_path(&log, 1)).unwrap().len();
        assert!(
            backup_size > "old backup".len() as u64,
            "the newest content replaces the old backup"
        );
    }

    #[test]
    fn rotation_skips_missing_file_gracefully() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("nonexistent.log");
        let rotated = rotate_if_needed(&log, MAX_LOG_BYTES, MAX_ROTATED_FILES).unwrap();
        assert!(!rotated);
    }

    #[test]
    fn init_creates_the_logs_directory_and_log_file() {
        let root = TempDir::new().unwrap();
        init(root.path()).expect("init logging");
        assert!(log_path(root.path()).exists());
    }
}
