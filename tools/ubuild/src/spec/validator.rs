/*!
Enforces the arity rules: every recognized section
must carry its required keys, with counts matching when a fixed arity is
specified. All violations are collected before failing, so a caller sees
every missing parameter in one shot rather than one-at-a-time.
*/
use super::{error, SectionKind, Spec};

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

/// A required key and how many occurrences are allowed: `None` means "at
/// least one", `Some(n)` means "exactly n".
struct Requirement {
    key: &'static str,
    count: Option<usize>,
}

const UBUILD_REQUIREMENTS: &[Requirement] = &[
    Requirement { key: "build_dir", count: Some(1) },
    Requirement { key: "build_image", count: Some(1) },
    Requirement { key: "cache_dir", count: Some(1) },
    Requirement { key: "compile_dir", count: Some(1) },
    Requirement { key: "destination_dir", count: Some(1) },
    Requirement { key: "image_name", count: Some(1) },
    Requirement { key: "initramfs_rootfs_dir", count: Some(1) },
    Requirement { key: "rootfs_dir", count: Some(1) },
    Requirement { key: "sources_dir", count: Some(1) },
];

const TARGET_REQUIREMENTS: &[Requirement] = &[
    Requirement { key: "build", count: None },
    Requirement { key: "url", count: None },
    Requirement { key: "sources", count: Some(1) },
];

/// Validate `spec`, collecting every missing-parameter diagnostic before
/// failing. Returns `Ok(())` only if the spec is fully usable by the
/// orchestrator.
pub fn validate(spec: &Spec) -> Result<()> {
    let mut diagnostics = Vec::new();

    if spec.section("ubuild").is_none() {
        diagnostics.push("[ubuild] section is missing".to_string());
    }

    for (name, section) in spec.sections() {
        let requirements = match section.kind() {
            Some(SectionKind::Ubuild) => UBUILD_REQUIREMENTS,
            Some(SectionKind::Cross) | Some(SectionKind::Pkg) => TARGET_REQUIREMENTS,
            None => continue,
        };

        for requirement in requirements {
            check(name, section, requirement, &mut diagnostics);
        }
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        error::MissingParametersSnafu { diagnostics }.fail()
    }
}

fn check(
    section_name: &str,
    section: &super::Section,
    requirement: &Requirement,
    diagnostics: &mut Vec<String>,
) {
    if !section.contains(requirement.key) {
        diagnostics.push(format!("[{section_name}].{} not set", requirement.key));
        return;
    }

    if let Some(expected) = requirement.count {
        let actual = section.count(requirement.key);
        if actual != expected {
            diagnostics.push(format!(
                "[{section_name}].{} maximum {expected} occurrences",
                requirement.key
            ));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spec::parser;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(path: &std::path::Path, content: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn empty_ubuild_section_lists_every_missing_key() {
        let dir = tempdir().unwrap();
        let spec_path = dir.path().join("a.spec");
        write(&spec_path, "[ubuild]\n");

        let spec = parser::parse(&spec_path).unwrap();
        let err = validate(&spec).unwrap_err();
        match err {
            Error::MissingParameters { diagnostics } => {
                assert_eq!(diagnostics.len(), UBUILD_REQUIREMENTS.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_spec_ubuild_section_is_flagged() {
        let dir = tempdir().unwrap();
        let spec_path = dir.path().join("a.spec");
        write(&spec_path, "[cross=gcc]\nsources=x\nbuild=/bin/true\nurl=http://x/a\n");

        let spec = parser::parse(&spec_path).unwrap();
        let err = validate(&spec).unwrap_err();
        match err {
            Error::MissingParameters { diagnostics } => {
                assert!(diagnostics.contains(&"[ubuild] section is missing".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn complete_target_passes() {
        let dir = tempdir().unwrap();
        let spec_path = dir.path().join("a.spec");
        let build_dir = dir.path().join("build");
        let cache_dir = dir.path().join("cache");
        let compile_dir = dir.path().join("compile");
        let dest_dir = dir.path().join("dest");
        let rootfs_dir = dir.path().join("rootfs");
        fs::create_dir_all(&rootfs_dir).unwrap();
        let initramfs_dir = dir.path().join("initramfs");
        fs::create_dir_all(&initramfs_dir).unwrap();
        let sources_dir = dir.path().join("sources");
        fs::create_dir_all(&sources_dir).unwrap();
        let build_image = dir.path().join("build_image.sh");
        write(&build_image, "#!/bin/sh\n");
        let mut perms = fs::metadata(&build_image).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        fs::set_permissions(&build_image, perms).unwrap();

        write(
            &spec_path,
            &format!(
                "[ubuild]\nbuild_dir={}\nbuild_image={}\ncache_dir={}\ncompile_dir={}\n\
                 destination_dir={}\nimage_name=demo\ninitramfs_rootfs_dir={}\n\
                 rootfs_dir={}\nsources_dir={}\n[pkg=demo]\nsources=demo-1.0\n\
                 build={}\nurl=http://example.invalid/demo-1.0.tar\n",
                build_dir.display(),
                build_image.display(),
                cache_dir.display(),
                compile_dir.display(),
                dest_dir.display(),
                initramfs_dir.display(),
                rootfs_dir.display(),
                sources_dir.display(),
                build_image.display(),
            ),
        );

        let spec = parser::parse(&spec_path).unwrap();
        assert!(validate(&spec).is_ok());
    }
}
