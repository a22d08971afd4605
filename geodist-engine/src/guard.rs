//! Pre-flight resource checks and sleep inhibition.
//!
//! [`DiskSpaceGuard`] is the cheap per-batch check that aborts a run
//! before the store's volume fills up: the store stays valid between
//! batches, so an aborted run resumes cleanly once space is freed.
//!
//! [`keep_awake`] holds the host out of idle sleep for the duration of a
//! long run. The platform mechanism is selected at startup behind the
//! [`Inhibitor`] capability trait, and the returned guard releases the
//! inhibition on drop, on every exit path.

use crate::errors::{EngineError, EngineResult};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Free-space floor check for the volume holding the checkpoint store.
#[derive(Debug, Clone)]
pub struct DiskSpaceGuard {
    path: PathBuf,
    min_free_bytes: u64,
}

impl DiskSpaceGuard {
    /// Guards the filesystem containing `path`. The path must exist.
    pub fn new(path: impl Into<PathBuf>, min_free_bytes: u64) -> Self {
        Self {
            path: path.into(),
            min_free_bytes,
        }
    }

    /// Guards the directory that will hold the store file at `db_path`.
    /// The store file itself may not exist yet.
    pub fn for_store(db_path: &Path, min_free_bytes: u64) -> Self {
        let dir = db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir, min_free_bytes)
    }

    /// Compares available space against the configured floor.
    ///
    /// # Errors
    /// [`EngineError::ResourceExhausted`] if available space is below the
    /// floor; [`EngineError::Io`] if the filesystem cannot be queried.
    pub fn check(&self) -> EngineResult<()> {
        let available = fs2::available_space(&self.path)?;
        if available < self.min_free_bytes {
            return Err(EngineError::ResourceExhausted {
                path: self.path.clone(),
                available,
                required: self.min_free_bytes,
            });
        }
        Ok(())
    }
}

/// Capability for holding the host out of idle sleep.
pub trait Inhibitor {
    /// Acquires the inhibition. The returned guard releases it on drop.
    fn acquire(&self) -> std::io::Result<AwakeGuard>;
}

/// Scoped sleep inhibition. Dropping the guard releases it
/// unconditionally, whether the run succeeded or failed.
pub struct AwakeGuard {
    child: Option<Child>,
}

impl AwakeGuard {
    /// A guard that holds nothing.
    pub fn noop() -> Self {
        Self { child: None }
    }

    /// Whether an inhibitor process is actually held.
    pub fn is_active(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for AwakeGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Inhibitor backed by a helper process that blocks sleep while it lives.
struct CommandInhibitor {
    program: &'static str,
    args: &'static [&'static str],
}

impl Inhibitor for CommandInhibitor {
    fn acquire(&self) -> std::io::Result<AwakeGuard> {
        let child = Command::new(self.program)
            .args(self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(AwakeGuard { child: Some(child) })
    }
}

/// Inhibitor for platforms without a known mechanism.
struct NoopInhibitor;

impl Inhibitor for NoopInhibitor {
    fn acquire(&self) -> std::io::Result<AwakeGuard> {
        Ok(AwakeGuard::noop())
    }
}

fn platform_inhibitor() -> Box<dyn Inhibitor> {
    if cfg!(target_os = "macos") {
        Box::new(CommandInhibitor {
            program: "caffeinate",
            args: &["-i"],
        })
    } else if cfg!(target_os = "linux") {
        Box::new(CommandInhibitor {
            program: "systemd-inhibit",
            args: &[
                "--what=sleep:idle",
                "--who=geodist",
                "--why=pairwise distance run",
                "sleep",
                "infinity",
            ],
        })
    } else {
        Box::new(NoopInhibitor)
    }
}

/// Acquires the platform sleep inhibitor. Acquisition failure (helper
/// binary missing, permissions) degrades to a no-op guard rather than
/// failing the run.
pub fn keep_awake() -> AwakeGuard {
    platform_inhibitor()
        .acquire()
        .unwrap_or_else(|_| AwakeGuard::noop())
}
