//! Atomic promotion of a staged ring to the live path.
//!
//! Readers of the live path see either the old ring or the new one, never a
//! partial file: the final step is always a rename within one directory.

use crate::config::parent_dir;
use crate::error::{Result, SyncError};
use std::fs::{self, File};
use std::io;
use std::path::Path;

#[cfg(unix)]
const RING_MODE: u32 = 0o644;

/// Move `staged` to `destination`, replacing whatever is there.
///
/// If `staged` lives in another directory it is first copied next to
/// `destination`, so the rename never crosses filesystems. The result is
/// world-readable.
///
/// # Errors
///
/// [`SyncError::Replace`] if any step fails; `destination` is then untouched.
pub fn replace(staged: &Path, destination: &Path) -> Result<()> {
    let err = |source: io::Error| SyncError::Replace {
        path: destination.to_path_buf(),
        source,
    };
    let dest_dir = parent_dir(destination);

    if same_dir(&parent_dir(staged), &dest_dir) {
        set_ring_permissions(staged).map_err(err)?;
        fs::rename(staged, destination).map_err(err)?;
    } else {
        let mut source = File::open(staged).map_err(err)?;
        let mut local = tempfile::Builder::new()
            .prefix(".ring-replace.")
            .suffix(".tmp")
            .tempfile_in(&dest_dir)
            .map_err(err)?;
        io::copy(&mut source, local.as_file_mut()).map_err(err)?;
        local.as_file().sync_all().map_err(err)?;
        set_ring_permissions(local.path()).map_err(err)?;
        local.persist(destination).map_err(|e| err(e.error))?;
        // The copy is live; drop the staged file.
        let _ = fs::remove_file(staged);
    }

    sync_dir(&dest_dir);
    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(unix)]
fn set_ring_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(RING_MODE))
}

#[cfg(not(unix))]
fn set_ring_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Flush the rename to disk. Best effort: not every platform can open a directory.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}
