/*!
Content-addressed build cache: [`keyer`] derives an entry name from a build
unit's identity, [`store`] packs/unpacks the `.tar.xz` archive that name
resolves to. This module glues the two together into the lookup/pack/unpack
operations the orchestrator drives.
*/
pub(crate) mod error;
pub mod keyer;
pub mod store;

pub use error::Error;
use keyer::KeyInputs;
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, Error>;

/// Recompute the entry path for `inputs` and return it only if a cache hit
/// already exists on disk.
pub fn lookup(cache_dir: &Path, inputs: &KeyInputs) -> Result<Option<PathBuf>> {
    let entry_path = keyer::entry_path(cache_dir, inputs)?;
    Ok(store::lookup(&entry_path).map(Path::to_path_buf))
}

/// Pack `image_dir` into the cache entry named by `inputs`. Failures are
/// logged and reported as `Ok(false)`, matching the orchestrator's
/// best-effort pack contract.
pub fn pack(cache_dir: &Path, image_dir: &Path, inputs: &KeyInputs) -> Result<bool> {
    let entry_path = keyer::entry_path(cache_dir, inputs)?;
    Ok(store::pack(image_dir, &entry_path)?)
}

/// Unpack a previously located cache hit into `dir`.
pub fn unpack(dir: &Path, entry_path: &Path) -> Result<()> {
    Ok(store::unpack(dir, entry_path)?)
}
