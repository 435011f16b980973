use crate::preprocessor;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(transparent)]
    Preprocess { source: preprocessor::Error },

    #[snafu(display("[{section}] section is missing"))]
    MissingSection { section: String },

    #[snafu(display("[{section}].{key} not set"))]
    MissingKey { section: String, key: &'static str },

    #[snafu(display("missing parameters:\n{}", diagnostics.join("\n")))]
    MissingParameters { diagnostics: Vec<String> },
}
