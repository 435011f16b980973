/*!
Runs the external `env_sourcer.sh` helper against an environment file and
collects the `KEY=VALUE` assignments it prints.

Capturing stdout directly via `duct`'s `.stdout_capture()` preserves the
contract (nonzero exit → no environment, `KEY=VALUE` parsing, cwd =
env-file directory, a minimal injected environment) without allocating a
temp file a caller would need to clean up.
*/
pub(crate) mod error;

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

use snafu::ResultExt;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Name of the environment variable that can override the location of the
/// `env_sourcer.sh` helper, for testing or non-standard installs.
pub const SOURCER_OVERRIDE_VAR: &str = "UBUILD_ENV_SOURCER_PATH";

/// Locate the `env_sourcer.sh` helper: next to the running executable by
/// default, or wherever `UBUILD_ENV_SOURCER_PATH` points if set.
pub fn sourcer_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(SOURCER_OVERRIDE_VAR) {
        return Ok(PathBuf::from(path));
    }
    let exe = std::env::current_exe().context(error::LocateHelperSnafu)?;
    let dir = exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(dir.join("env_sourcer.sh"))
}

/// Source `env_file` via the `env_sourcer.sh` helper, running it with cwd
/// set to the env file's directory and only the supplied `env` in scope.
/// Returns the `KEY=VALUE` assignments the helper printed to stdout.
pub fn source(env_file: &Path, env: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    let sourcer = sourcer_path()?;
    let dir = env_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let expression = duct::cmd(&sourcer, [env_file.as_os_str()])
        .dir(&dir)
        .full_env(env.clone())
        .stdout_capture()
        .stderr_capture()
        .unchecked();

    let output = expression.run().context(error::SpawnSnafu {
        sourcer: sourcer.clone(),
    })?;

    if !output.status.success() {
        return error::ExitStatusSnafu {
            env_file: env_file.to_path_buf(),
            status: output.status.code().unwrap_or(-1),
        }
        .fail();
    }

    Ok(parse_assignments(&output.stdout))
}

fn parse_assignments(stdout: &[u8]) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
        if let Some((key, value)) = line.split_once('=') {
            env.insert(key.to_string(), value.to_string());
        }
    }
    env
}
