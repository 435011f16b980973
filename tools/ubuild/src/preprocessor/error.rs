use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid preprocessor line: {line}"))]
    IncludeTarget { line: String },

    #[snafu(display("cannot read {}", path.display()))]
    IncludeRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("include cycle detected at {}", path.display()))]
    IncludeCycle { path: PathBuf },
}
