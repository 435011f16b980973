use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("cannot read {} to digest it", path.display()))]
    DigestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to run tar packing {}", entry.display()))]
    PackSpawn {
        entry: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to publish cache entry {}", entry.display()))]
    PackPublish {
        entry: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to run tar unpacking {}", entry.display()))]
    UnpackSpawn {
        entry: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("tar exited {status} unpacking {}", entry.display()))]
    UnpackStatus { entry: PathBuf, status: i32 },
}
