/*!
Packs and unpacks the `tar.xz` archives a cache entry is made of. Packing
is best-effort from the orchestrator's point of view (a failure is logged,
not fatal); unpacking a cache hit is not, since a truncated/missing archive
means the build unit has nothing to fall back on.
*/
use super::error;
use duct::cmd;
use log::warn;
use snafu::ResultExt;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

/// Return `entry_path` if it names an existing regular file, `None` otherwise.
pub fn lookup(entry_path: &Path) -> Option<&Path> {
    entry_path.is_file().then_some(entry_path)
}

/// Compress `image_dir`'s contents into `entry_path`, publishing it via a
/// `.tmp` sibling and a rename so a reader never observes a partial entry.
/// A pack failure is logged and reported as `Ok(false)`; only a failure to
/// even spawn `tar` is returned as an `Err`.
pub fn pack(image_dir: &Path, entry_path: &Path) -> Result<bool> {
    let tmp_path = PathBuf::from(format!("{}.tmp", entry_path.display()));

    let args: Vec<OsString> = vec![
        "-c".into(),
        "-J".into(),
        "-p".into(),
        "-f".into(),
        tmp_path.clone().into(),
        "./".into(),
    ];
    let output = cmd("tar", args)
        .dir(image_dir)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .context(error::PackSpawnSnafu {
            entry: entry_path.to_path_buf(),
        })?;

    if !output.status.success() {
        warn!(
            "failed to pack cache entry {}: tar exited {:?}",
            entry_path.display(),
            output.status.code()
        );
        let _ = fs::remove_file(&tmp_path);
        return Ok(false);
    }

    fs::rename(&tmp_path, entry_path).context(error::PackPublishSnafu {
        entry: entry_path.to_path_buf(),
    })?;
    Ok(true)
}

/// Extract `entry_path` into `dir`. A nonzero `tar` exit is fatal to the
/// caller, per the build-orchestrator contract.
pub fn unpack(dir: &Path, entry_path: &Path) -> Result<()> {
    let args: Vec<OsString> = vec![
        "-x".into(),
        "-J".into(),
        "-f".into(),
        entry_path.as_os_str().to_os_string(),
    ];
    let output = cmd("tar", args)
        .dir(dir)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .context(error::UnpackSpawnSnafu {
            entry: entry_path.to_path_buf(),
        })?;

    if !output.status.success() {
        return error::UnpackStatusSnafu {
            entry: entry_path.to_path_buf(),
            status: output.status.code().unwrap_or(-1),
        }
        .fail();
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn pack_then_unpack_round_trips_file_contents() {
        let image_dir = tempdir().unwrap();
        let mut f = File::create(image_dir.path().join("payload.txt")).unwrap();
        f.write_all(b"hello cache").unwrap();

        let cache_dir = tempdir().unwrap();
        let entry_path = cache_dir.path().join("demo_deadbeef.tar.xz");

        assert!(pack(image_dir.path(), &entry_path).unwrap());
        assert!(lookup(&entry_path).is_some());

        let unpack_dir = tempdir().unwrap();
        unpack(unpack_dir.path(), &entry_path).unwrap();

        let contents = fs::read_to_string(unpack_dir.path().join("payload.txt")).unwrap();
        assert_eq!(contents, "hello cache");
    }

    #[test]
    fn lookup_misses_on_absent_entry() {
        let cache_dir = tempdir().unwrap();
        let entry_path = cache_dir.path().join("nope_cafe.tar.xz");
        assert!(lookup(&entry_path).is_none());
    }

    #[test]
    fn unpack_of_missing_archive_fails() {
        let dir = tempdir().unwrap();
        let entry_path = dir.path().join("absent.tar.xz");
        assert!(unpack(dir.path(), &entry_path).is_err());
    }
}
