//! Scoped working-directory switch.

use std::{
    env, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

/// The working directory is process-wide; one switch at a time.
static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Switches the process working directory and restores it on drop,
/// including when unwinding from a panic.
///
/// Holding the guard serializes other switches.
pub struct WorkingDirGuard {
    previous: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl WorkingDirGuard {
    /// Enter `dir`.
    ///
    /// # Errors
    /// Returns error if the current directory cannot be read or `dir`
    /// cannot be entered. The working directory is unchanged in that case.
    pub fn enter(dir: &Path) -> io::Result<Self> {
        let lock = CWD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = env::current_dir()?;
        tracing::debug!("Using current directory '{}'", dir.display());
        env::set_current_dir(dir)?;
        Ok(Self {
            previous,
            _lock: lock,
        })
    }

    /// Directory restored on drop.
    #[must_use]
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

/// Serializes tests that observe the process working directory.
#[cfg(test)]
pub(crate) fn serial() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = Mutex::new(());
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.previous) {
            tracing::error!(
                "Failed to restore working directory '{}': {e}",
                self.previous.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn restores_on_normal_exit_and_on_panic() {
        let _serial = serial();
        let target = tempfile::tempdir().unwrap();
        let target_path = target.path().canonicalize().unwrap();
        let before = env::current_dir().unwrap();

        {
            let guard = WorkingDirGuard::enter(&target_path).unwrap();
            assert_eq!(env::current_dir().unwrap(), target_path);
            assert_eq!(guard.previous(), before);
        }
        assert_eq!(env::current_dir().unwrap(), before);

        let outcome = panic::catch_unwind(|| {
            let _guard = WorkingDirGuard::enter(&target_path).unwrap();
            panic!("operation blew up");
        });
        assert!(outcome.is_err());
        assert_eq!(env::current_dir().unwrap(), before);

        // The lock survives poisoning.
        let _guard = WorkingDirGuard::enter(&target_path).unwrap();
    }

    #[test]
    fn missing_directory_leaves_cwd_alone() {
        let _serial = serial();
        let before = env::current_dir().unwrap();
        assert!(WorkingDirGuard::enter(Path::new("/definitely/not/here")).is_err());
        assert_eq!(env::current_dir().unwrap(), before);
    }
}
