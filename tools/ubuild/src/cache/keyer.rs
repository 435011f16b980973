/*!
Derives the content-addressed cache entry name for one build unit: a SHA-1
digest absorbing the target identity, build argv vectors, patch content,
tarball content (or a placeholder if the source is missing), and a
whitelisted slice of the environment, each block separated by a literal
`"--"`.
*/
use super::error;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use snafu::ResultExt;

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

/// The inputs that determine one build unit's cache key.
pub struct KeyInputs<'a> {
    pub seed: &'a str,
    pub builds: &'a [Vec<String>],
    pub patches: &'a [PathBuf],
    pub tarball_names: &'a [String],
    pub sources_dir: &'a Path,
    pub cache_vars: &'a [String],
    pub environment: &'a BTreeMap<String, String>,
}

/// Compute the `<tarballs>_<hex>.tar.xz` entry name for `inputs`, resolved
/// against `cache_dir`.
pub fn entry_path(cache_dir: &Path, inputs: &KeyInputs) -> Result<PathBuf> {
    let digest = digest_hex(inputs)?;
    let tarball_names_str = inputs.tarball_names.join("_");
    Ok(cache_dir.join(format!("{tarball_names_str}_{digest}.tar.xz")))
}

fn digest_hex(inputs: &KeyInputs) -> Result<String> {
    let mut sha = Sha1::new();
    sha.update(inputs.seed.as_bytes());
    sha.update(b"--");

    for args in inputs.builds {
        sha.update(b"--");
        for arg in args {
            sha.update(arg.as_bytes());
        }
        sha.update(b"--");
    }

    sha.update(b"--");
    for patch in inputs.patches {
        sha.update(file_sha1_hex(patch)?.as_bytes());
    }

    sha.update(b"--");
    for tarball in inputs.tarball_names {
        sha.update(tarball.as_bytes());
        let path = inputs.sources_dir.join(tarball);
        if path.is_file() {
            sha.update(file_sha1_hex(&path)?.as_bytes());
        } else {
            // Not found: preserve a seat in the digest with the path string.
            sha.update(path.to_string_lossy().as_bytes());
        }
    }

    sha.update(b"--");
    for key in inputs.cache_vars {
        let value = inputs.environment.get(key).map(String::as_str).unwrap_or("");
        sha.update(format!("{key}={value}\n").as_bytes());
    }
    sha.update(b"--");

    Ok(hex_encode(&sha.finalize()))
}

fn file_sha1_hex(path: &Path) -> Result<String> {
    let bytes = fs::read(path).context(error::DigestReadSnafu {
        path: path.to_path_buf(),
    })?;
    let mut sha = Sha1::new();
    sha.update(&bytes);
    Ok(hex_encode(&sha.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
