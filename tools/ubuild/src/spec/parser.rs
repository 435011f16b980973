/*!
Turns the flat, `#include`-expanded line sequence from [`crate::preprocessor`]
into a [`Spec`](super::Spec): a multi-valued, insertion-ordered mapping from
section name to key/value body, with per-key mangling applied along the way.
*/
use super::mangle::{self, Mangler};
use super::{error, SectionKind, Spec};
use crate::preprocessor;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::path::Path;

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

lazy_static! {
    static ref SECTION_RE: Regex = Regex::new(r"^\[(.*)\]$").unwrap();
}

const COMMENT_CHAR: char = '#';

/// Parse `spec_path` into a [`Spec`]. This does not run [`super::validator`]
/// — callers that need a spec ready for the build orchestrator should call
/// `validator::validate` immediately afterwards.
pub fn parse(spec_path: &Path) -> Result<Spec> {
    let lines = preprocessor::expand(spec_path)?;
    let spec_dir = spec_path.parent().unwrap_or_else(|| Path::new("."));

    let mut spec = Spec::new();
    let mut current: Option<(String, SectionKind)> = None;

    for raw_line in lines {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(COMMENT_CHAR) {
            continue;
        }

        if let Some(captures) = SECTION_RE.captures(line) {
            let candidate = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            match SectionKind::classify(candidate) {
                Some(kind) => {
                    spec.section_mut(candidate, kind);
                    current = Some((candidate.to_string(), kind));
                }
                None => {
                    warn!("section [{candidate}] is not recognized");
                    current = None;
                }
            }
            continue;
        }

        let Some((section_name, kind)) = current.clone() else {
            debug!("ignoring line '{line}', no section defined");
            continue;
        };

        let Some((key, value)) = split_key_value(line) else {
            warn!("unsupported line '{line}' in section [{section_name}]");
            continue;
        };

        let Some(mangler) = mangle::mangler_for(kind, key) else {
            warn!("unsupported parameter '{key}' in section [{section_name}]");
            continue;
        };

        apply(&mut spec, spec_dir, &section_name, kind, mangler, key, value);
    }

    Ok(spec)
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

fn apply(
    spec: &mut Spec,
    spec_dir: &Path,
    section_name: &str,
    kind: SectionKind,
    mangler: Mangler,
    key: &str,
    raw_value: &str,
) {
    if raw_value.is_empty() {
        warn!("invalid value '{raw_value}' for parameter '{key}' in section [{section_name}]");
        return;
    }

    match mangle::mangle(mangler, spec_dir, section_name, key, raw_value) {
        Some(value) => spec.section_mut(section_name, kind).push(key, value),
        None => {
            warn!("invalid value '{raw_value}' for parameter '{key}' in section [{section_name}]");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spec::Value;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn include_expansion_merges_sections() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        let b = dir.path().join("b.spec");
        write(&b, "[ubuild]\nbuild_dir=.\n");
        write(&a, "#include b.spec\n[ubuild]\nimage_name=x\n");

        let spec = parse(&a).unwrap();
        let ubuild = spec.section("ubuild").unwrap();
        assert_eq!(ubuild.get_one("image_name").unwrap().as_str(), Some("x"));
        assert!(ubuild.get_one("build_dir").is_some());
    }

    #[test]
    fn unknown_section_is_silently_dropped() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        write(
            &a,
            "[bogus=x]\nfoo = bar\n[ubuild]\nimage_name=x\nunknown_key = y\n",
        );

        let spec = parse(&a).unwrap();
        assert!(spec.section("bogus=x").is_none());
        let ubuild = spec.section("ubuild").unwrap();
        assert!(!ubuild.contains("unknown_key"));
        assert_eq!(ubuild.get_one("image_name").unwrap().as_str(), Some("x"));
    }

    #[test]
    fn repeated_keys_preserve_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        write(
            &a,
            "[pkg=demo]\nsources=demo-1.0\nurl = http://a/one.tar\nurl = http://a/two.tar\n",
        );

        let spec = parse(&a).unwrap();
        let section = spec.section("pkg=demo").unwrap();
        let urls: Vec<_> = section
            .get("url")
            .iter()
            .map(|v| v.as_url().unwrap().1.to_string())
            .collect();
        assert_eq!(urls, vec!["one.tar".to_string(), "two.tar".to_string()]);
    }

    #[test]
    fn cross_and_pkg_targets_preserve_insertion_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        write(
            &a,
            "[cross=gcc]\nsources=s\n[cross=binutils]\nsources=s\n[pkg=b]\nsources=s\n[pkg=a]\nsources=s\n",
        );

        let spec = parse(&a).unwrap();
        assert_eq!(spec.cross_targets(), vec!["cross=gcc", "cross=binutils"]);
        assert_eq!(spec.pkg_targets(), vec!["pkg=b", "pkg=a"]);
    }

    #[test]
    fn non_executable_build_script_is_rejected() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        let script = dir.path().join("build.sh");
        write(&script, "#!/bin/sh\n");
        write(
            &a,
            &format!("[pkg=demo]\nsources=demo\nbuild = {}\n", script.display()),
        );

        let spec = parse(&a).unwrap();
        let section = spec.section("pkg=demo").unwrap();
        assert!(section.get("build").is_empty());
    }

    #[test]
    fn value_type_matches_key() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.spec");
        write(&a, "[ubuild]\nimage_name = rootfs\n");
        let spec = parse(&a).unwrap();
        match spec.section("ubuild").unwrap().get_one("image_name").unwrap() {
            Value::String(s) => assert_eq!(s, "rootfs"),
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
