/*!
Expands `#include <path>` directives in a spec file into a flat line
sequence, recursively, before the parser ever sees section headers.

The include token is recognized the same way the parser recognizes other
statements: split the whitespace-trimmed line on the first run of
whitespace and compare the first token. A relative include path is resolved
against the directory of the file that contains the `#include` line.

Expansion runs twice at the outer level: once while the file content is
being assembled, and once more over the fully assembled lines. The second
sweep is a no-op in practice because the first sweep already consumed every
`#include` token, but it is kept deliberately rather than collapsed away.
*/
pub(crate) mod error;

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};

const INCLUDE_TOKEN: &str = "#include";

/// Preprocess `spec_path`, returning the flat, `#include`-expanded line
/// sequence (without trailing newlines) that the parser consumes.
pub fn expand(spec_path: &Path) -> Result<Vec<String>> {
    let canonical = canonicalize(spec_path)?;
    let content = read_file(spec_path)?;
    let dir = parent_dir(spec_path);

    let mut stack = vec![canonical];
    let mut first_pass = String::new();
    for raw_line in content.split_inclusive('\n') {
        first_pass.push_str(&recursive_expand(raw_line, &dir, &mut stack)?);
    }

    // Second, top-level sweep. Any #include tokens were already consumed
    // above, so this only re-validates already-expanded text.
    let mut second_pass = String::new();
    let mut outer_stack = vec![canonicalize(spec_path)?];
    for raw_line in first_pass.split_inclusive('\n') {
        second_pass.push_str(&recursive_expand(raw_line, &dir, &mut outer_stack)?);
    }

    Ok(second_pass.split('\n').map(str::to_string).collect())
}

/// Expand a single raw line (including its trailing `\n`, if any). Lines
/// that are not `#include` statements are returned unchanged.
fn recursive_expand(raw_line: &str, including_dir: &Path, stack: &mut Vec<PathBuf>) -> Result<String> {
    match first_token(raw_line) {
        Some(INCLUDE_TOKEN) => include_expand(raw_line, including_dir, stack),
        _ => Ok(raw_line.to_string()),
    }
}

fn first_token(raw_line: &str) -> Option<&str> {
    raw_line.trim_start().split_whitespace().next()
}

fn include_expand(raw_line: &str, including_dir: &Path, stack: &mut Vec<PathBuf>) -> Result<String> {
    let rest = raw_line
        .trim_start()
        .splitn(2, char::is_whitespace)
        .nth(1)
        .unwrap_or("")
        .trim();

    if rest.is_empty() {
        // `#include` with nothing after it: left untouched, as the
        // reference does not treat this as an error.
        return Ok(raw_line.to_string());
    }

    let candidate = Path::new(rest);
    let path = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        including_dir.join(candidate)
    };

    if !path.is_file() {
        return error::IncludeTargetSnafu {
            line: raw_line.trim_end().to_string(),
        }
        .fail();
    }

    let canonical = canonicalize(&path)?;
    if stack.contains(&canonical) {
        return error::IncludeCycleSnafu { path: canonical }.fail();
    }

    let content = read_file(&path)?;
    let dir = parent_dir(&path);

    stack.push(canonical);
    let mut acc = String::new();
    for nested_line in content.split_inclusive('\n') {
        acc.push_str(&recursive_expand(nested_line, &dir, stack)?);
    }
    stack.pop();

    // The reference appends one extra newline after every expanded block.
    acc.push('\n');
    Ok(acc)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).context(error::IncludeReadSnafu {
        path: path.to_path_buf(),
    })
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize().context(error::IncludeReadSnafu {
        path: path.to_path_buf(),
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn include_expands_into_flat_lines() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        let b = dir.path().join("b.spec");
        write(&b, "[ubuild]\nbuild_dir=/tmp\n");
        write(&a, "#include b.spec\n[ubuild]\nimage_name=x\n");

        let lines = expand(&a).unwrap();
        assert!(lines.iter().any(|l| l == "build_dir=/tmp"));
        assert!(lines.iter().any(|l| l == "image_name=x"));
    }

    #[test]
    fn absolute_include_path_is_honored() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        let b = dir.path().join("b.spec");
        write(&b, "[ubuild]\nimage_name=abs\n");
        write(&a, &format!("#include {}\n", b.display()));

        let lines = expand(&a).unwrap();
        assert!(lines.iter().any(|l| l == "image_name=abs"));
    }

    #[test]
    fn missing_include_target_is_an_error() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        write(&a, "#include nope.spec\n");

        let err = expand(&a).unwrap_err();
        assert!(matches!(err, Error::IncludeTarget { .. }));
    }

    #[test]
    fn include_cycle_is_rejected() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        let b = dir.path().join("b.spec");
        write(&a, "#include b.spec\n");
        write(&b, "#include a.spec\n");

        let err = expand(&a).unwrap_err();
        assert!(matches!(err, Error::IncludeCycle { .. }));
    }
}
