/*!
Builds embedded-system root-filesystem images from a staged, declarative
spec: see [`spec`] for the configuration language, [`preprocessor`] for its
`#include` expansion, [`env_sourcer`] and [`cache`] for the orchestrator's
two external collaborators, and [`orchestrator`] for the staged build
pipeline itself.
*/
pub mod cache;
pub mod env_sourcer;
pub mod orchestrator;
pub mod preprocessor;
pub mod spec;

use snafu::Snafu;
use std::path::Path;

/// Unifies every module's error type for callers that drive the whole
/// pipeline (the CLI entry point) rather than a single stage.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(transparent)]
    Spec { source: spec::Error },

    #[snafu(transparent)]
    Orchestrator { source: orchestrator::Error },
}

type Result<T> = std::result::Result<T, Error>;

/// Preprocess, parse, and validate `spec_path`. On success, run the full
/// build pipeline against it.
///
/// A preprocessor failure (bad `#include`) and a validation failure (missing
/// parameters) both surface as `Error::Spec`, wrapping `spec::Error::Preprocess`
/// or `spec::Error::MissingParameters` respectively; callers that need to
/// print "one bullet per diagnostic" or exit with a distinct status (per the
/// CLI contract) should match on those variants specifically rather than
/// treating every error alike.
pub fn run(spec_path: &Path, label: &str) -> Result<()> {
    let parsed = spec::parser::parse(spec_path)?;
    spec::validator::validate(&parsed)?;
    orchestrator::build(&parsed, spec_path, label)?;
    Ok(())
}
