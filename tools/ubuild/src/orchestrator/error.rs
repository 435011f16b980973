use crate::{cache, env_sourcer, spec};
use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(transparent)]
    Spec { source: spec::Error },

    #[snafu(transparent)]
    EnvSourcer { source: env_sourcer::Error },

    #[snafu(transparent)]
    Cache { source: cache::Error },

    #[snafu(display("cannot list build_dir content at {}", path.display()))]
    ListBuildDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot create scratch image directory inside {}", build_dir.display()))]
    ScratchDir {
        build_dir: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to run {}", script.display()))]
    Spawn {
        script: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("build script {} exited {status}", script.display()))]
    ScriptFailed { script: PathBuf, status: i32 },

    #[snafu(display("{target}: build scripts did not move any output into UBUILD_IMAGE_DIR"))]
    EmptyImageDir { target: String },
}
