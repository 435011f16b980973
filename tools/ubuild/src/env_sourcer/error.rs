use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("cannot locate env_sourcer.sh relative to current executable"))]
    LocateHelper { source: std::io::Error },

    #[snafu(display("failed to run {}", sourcer.display()))]
    Spawn {
        sourcer: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("env_sourcer.sh exited {status} sourcing {}", env_file.display()))]
    ExitStatus { env_file: PathBuf, status: i32 },
}
