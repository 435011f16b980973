use clap::Parser;
use env_logger::Builder;
use log::{error, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use ubuild::spec::Error as SpecError;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Builds embedded-system root-filesystem images from one or more staged,
/// declarative spec files.
#[derive(Debug, Parser)]
#[clap(about, long_about = None, version)]
struct Args {
    /// One or more `.spec` files to build, in order.
    #[clap(required = true)]
    spec: Vec<PathBuf>,

    /// Set the logging level. One of [off|error|warn|info|debug|trace].
    /// You can also leave this unset and use the RUST_LOG env variable.
    #[clap(long = "log-level")]
    log_level: Option<LevelFilter>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level);

    for spec_path in &args.spec {
        let label = spec_path.display().to_string();
        match ubuild::run(spec_path, &label) {
            Ok(()) => continue,
            Err(ubuild::Error::Spec { source: SpecError::MissingParameters { diagnostics } }) => {
                eprintln!("[{label}] missing parameters:");
                for diagnostic in diagnostics {
                    eprintln!("  - {diagnostic}");
                }
                return ExitCode::from(2);
            }
            Err(ubuild::Error::Spec { source: SpecError::Preprocess { source } }) => {
                eprintln!("[{label}] {source}");
                return ExitCode::from(2);
            }
            Err(err) => {
                error!("[{label}] {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// Use `level` if present, or else use `RUST_LOG` if present, or else use
/// a default.
fn init_logger(level: Option<LevelFilter>) {
    match (std::env::var(env_logger::DEFAULT_FILTER_ENV).ok(), level) {
        (Some(_), None) => {
            Builder::from_default_env().init();
        }
        _ => {
            Builder::new()
                .filter(
                    Some(env!("CARGO_CRATE_NAME")),
                    level.unwrap_or(DEFAULT_LEVEL_FILTER),
                )
                .init();
        }
    }
}
