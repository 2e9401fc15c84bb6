//! Exclusive database lock taken by a running server. The lock file records
//! the holder's PID: a recorded PID that is no longer live means a crashed
//! process and the lock is ignored; unrecognized content is treated as held
//! by another process.

use std::path::{Path, PathBuf};

use crate::constants::SERVER_LOCK_FILE;
use crate::error::{DoltError, Result};

pub struct ServerLock {
    path: PathBuf,
}

impl ServerLock {
    pub fn path_for(store_dir: impl AsRef<Path>) -> PathBuf {
        store_dir.as_ref().join(SERVER_LOCK_FILE)
    }

    /// Acquire the lock for this process, failing with `LockHeld` if a live
    /// process holds it
    pub fn acquire(store_dir: impl AsRef<Path>) -> Result<ServerLock> {
        let path = ServerLock::path_for(&store_dir);
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match contents.trim().parse::<u32>() {
                    Ok(pid) if pid_is_live(pid) => {
                        return Err(DoltError::LockHeld(format!("pid {pid}")));
                    }
                    Ok(pid) => {
                        log::debug!("ignoring stale lock from dead pid {pid}");
                    }
                    Err(_) => {
                        return Err(DoltError::LockHeld(format!(
                            "unrecognized lock file {}",
                            path.display()
                        )));
                    }
                },
                Err(e) => return Err(DoltError::Io(e)),
            }
        }
        std::fs::create_dir_all(store_dir.as_ref())?;
        std::fs::write(&path, format!("{}\n", std::process::id()))?;
        Ok(ServerLock { path })
    }
}

impl Drop for ServerLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(target_os = "linux")]
fn pid_is_live(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_live(_pid: u32) -> bool {
    // Without a portable liveness probe, stay conservative
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = ServerLock::acquire(dir.path()).unwrap();
            assert!(ServerLock::path_for(dir.path()).exists());
            // Same-process re-acquire fails while held
            assert!(matches!(
                ServerLock::acquire(dir.path()),
                Err(DoltError::LockHeld(_))
            ));
        }
        assert!(!ServerLock::path_for(dir.path()).exists());
    }

    #[test]
    fn test_unrecognized_content_is_conservative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(ServerLock::path_for(dir.path()), "not a pid").unwrap();
        assert!(matches!(
            ServerLock::acquire(dir.path()),
            Err(DoltError::LockHeld(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_dead_pid_lock_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        // PID near the kernel max is vanishingly unlikely to be live
        std::fs::write(ServerLock::path_for(dir.path()), "4194200").unwrap();
        let lock = ServerLock::acquire(dir.path());
        assert!(lock.is_ok());
    }
}
