/*!
Drives the staged build pipeline: cross
environment and hooks, cross targets, target environment and hooks,
package targets, and finally the image build script. Each build unit
consults [`crate::cache`] for a content-addressed shortcut before falling
back to running its build scripts in a scratch image directory.
*/
pub(crate) mod error;

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

use crate::cache::{self, keyer::KeyInputs};
use crate::env_sourcer;
use crate::spec::{Section, Spec, Value};
use duct::cmd;
use log::{error, info, warn};
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Run the full pipeline for `spec`, logging each stage under `label`
/// (typically the spec file's display path).
pub fn build(spec: &Spec, spec_path: &Path, label: &str) -> Result<()> {
    setup(spec, label)?;

    let process_env: BTreeMap<String, String> = std::env::vars().collect();
    let ubuild = spec.ubuild()?;

    let mut cross_env = process_env.clone();
    source_files(spec, spec_path, ubuild, "cross_env", label, &mut cross_env)?;

    run_hooks(ubuild, "cross_pre", spec, spec_path, &cross_env, label)?;

    for target in spec.cross_targets() {
        build_unit(target, &cross_env, spec, spec_path, label)?;
    }

    run_hooks(ubuild, "cross_post", spec, spec_path, &cross_env, label)?;

    let mut env = process_env;
    source_files(spec, spec_path, ubuild, "env", label, &mut env)?;

    run_hooks(ubuild, "pre", spec, spec_path, &env, label)?;

    for target in spec.pkg_targets() {
        build_unit(target, &env, spec, spec_path, label)?;
    }

    run_hooks(ubuild, "post", spec, spec_path, &env, label)?;

    let build_env = base_ubuild_env(spec, spec_path, &env);
    let argv = spec.build_image()?;
    info!("[{label}] building image: {}", argv.join(" "));
    run_argv(argv, &build_env)?;

    Ok(())
}

/// Remove every top-level entry within `build_dir`, without removing the
/// directory itself.
fn setup(spec: &Spec, label: &str) -> Result<()> {
    let build_dir = spec.build_dir()?;
    if !build_dir.is_dir() {
        return Ok(());
    }
    info!("[{label}] cleaning build_dir {}", build_dir.display());
    let entries = std::fs::read_dir(build_dir).context(error::ListBuildDirSnafu {
        path: build_dir.to_path_buf(),
    })?;
    for entry in entries {
        let entry = entry.context(error::ListBuildDirSnafu {
            path: build_dir.to_path_buf(),
        })?;
        let path = entry.path();
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(err) = removed {
            warn!("[{label}] failed to remove {}: {err}", path.display());
        }
    }
    Ok(())
}

/// Minimal environment injected into every hook/build script: the
/// `UBUILD_*` globals derived from `spec`, layered over `base`.
fn base_ubuild_env(spec: &Spec, spec_path: &Path, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut env = base.clone();
    set_if_present(&mut env, "UBUILD_SPEC_PATH", Ok(spec_path.display().to_string()));
    set_if_present(&mut env, "UBUILD_BUILD_DIR", path_string(spec.build_dir()));
    set_if_present(&mut env, "UBUILD_COMPILE_DIR", path_string(spec.compile_dir()));
    set_if_present(
        &mut env,
        "UBUILD_INITRAMFS_ROOTFS_DIR",
        path_string(spec.initramfs_rootfs_dir()),
    );
    set_if_present(&mut env, "UBUILD_ROOTFS_DIR", path_string(spec.rootfs_dir()));
    set_if_present(&mut env, "UBUILD_SOURCES_DIR", path_string(spec.sources_dir()));
    set_if_present(&mut env, "UBUILD_CACHE_DIR", path_string(spec.cache_dir()));
    set_if_present(
        &mut env,
        "UBUILD_DESTINATION_DIR",
        path_string(spec.destination_dir()),
    );
    set_if_present(
        &mut env,
        "UBUILD_IMAGE_NAME",
        spec.image_name().map(str::to_string).map_err(|_| ()),
    );
    env
}

fn path_string(
    result: std::result::Result<&Path, crate::spec::Error>,
) -> std::result::Result<String, ()> {
    result.map(|p| p.display().to_string()).map_err(|_| ())
}

fn set_if_present(env: &mut BTreeMap<String, String>, key: &str, value: std::result::Result<String, ()>) {
    match value {
        Ok(v) => {
            env.insert(key.to_string(), v);
        }
        Err(()) => {
            warn!("{key} won't be set, its spec value is unset");
        }
    }
}

/// Sequentially source every `key` env file in `section` (usually `ubuild`),
/// starting from and accumulating into `env`.
fn source_files(
    spec: &Spec,
    spec_path: &Path,
    section: &Section,
    key: &str,
    label: &str,
    env: &mut BTreeMap<String, String>,
) -> Result<()> {
    let minimal = base_ubuild_env(spec, spec_path, &BTreeMap::new());
    for value in section.get(key) {
        let Some(path) = value.as_path() else { continue };
        info!("[{label}] reading {key}: {}", path.display());
        let sourced = env_sourcer::source(path, &minimal).map_err(|source| {
            error!("[{label}] cannot source env file: {}", path.display());
            source
        })?;
        env.extend(sourced);
    }
    Ok(())
}

/// Run every `key` hook argv in `section` in order, with cwd set to the
/// directory of each hook's own argv[0]. The first nonzero exit aborts.
fn run_hooks(
    section: &Section,
    key: &str,
    spec: &Spec,
    spec_path: &Path,
    base_env: &BTreeMap<String, String>,
    label: &str,
) -> Result<()> {
    let env = base_ubuild_env(spec, spec_path, base_env);
    for value in section.get(key) {
        let Some(argv) = value.as_argv() else { continue };
        info!("[{label}] spawning: {}", argv.join(" "));
        run_argv(argv, &env)?;
    }
    Ok(())
}

fn run_argv(argv: &[String], env: &BTreeMap<String, String>) -> Result<()> {
    let script = PathBuf::from(&argv[0]);
    let script_dir = script.parent().map(Path::to_path_buf).unwrap_or_default();

    let args: Vec<OsString> = argv.iter().map(OsString::from).collect();
    let (program, rest) = args.split_first().expect("argv0 mangler guarantees non-empty argv");

    let output = cmd(program, rest)
        .dir(&script_dir)
        .full_env(env.clone())
        .unchecked()
        .run()
        .context(error::SpawnSnafu {
            script: script.clone(),
        })?;

    let status = output.status.code().unwrap_or(-1);
    if output.status.success() {
        info!("{} exit status: {status}", script.display());
        Ok(())
    } else {
        error!("{} exit status: {status}", script.display());
        error::ScriptFailedSnafu {
            script,
            status,
        }
        .fail()
    }
}

/// Build one `cross=*`/`pkg=*` target: source its env files, run `pre`
/// hooks, consult the cache, and either unpack a hit or run the build
/// scripts into a scratch image directory and pack the result.
fn build_unit(target: &str, base_env: &BTreeMap<String, String>, spec: &Spec, spec_path: &Path, label: &str) -> Result<()> {
    let section = spec
        .section(target)
        .ok_or_else(|| crate::spec::error::MissingSectionSnafu { section: target }.build())?;

    let mut env = base_env.clone();
    for value in section.get("env") {
        let Some(path) = value.as_path() else { continue };
        info!("[{label}] reading package env: {}", path.display());
        let minimal = base_ubuild_env(spec, spec_path, &BTreeMap::new());
        let sourced = env_sourcer::source(path, &minimal)?;
        env.extend(sourced);
    }

    let scripts: Vec<&[String]> = section.get("build").iter().filter_map(Value::as_argv).collect();
    let urls: Vec<(&str, &str)> = section.get("url").iter().filter_map(Value::as_url).collect();
    let patches: Vec<&Path> = section.get("patch").iter().filter_map(Value::as_path).collect();

    info!("[{label}] building {target}...");
    for (url, rename) in &urls {
        info!("  URL: {url} -> {rename}");
    }
    for args in &scripts {
        info!("  build script: {}", args.join(" "));
    }
    for patch in &patches {
        info!("  patch: {}", patch.display());
    }

    let mut env = base_ubuild_env(spec, spec_path, &env);

    let patches_str = patches
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    if !patches_str.is_empty() {
        env.insert("UBUILD_PATCHES".to_string(), patches_str);
    }

    let url_str = urls
        .iter()
        .map(|(url, rename)| format!("{url} {rename}"))
        .collect::<Vec<_>>()
        .join(";");
    env.insert("UBUILD_SRC_URI".to_string(), url_str);
    env.insert("UBUILD_TARGET_NAME".to_string(), target.to_string());
    env.insert(
        "UBUILD_SOURCES".to_string(),
        spec.target_sources(target)?.to_string(),
    );

    for value in section.get("pre") {
        let Some(argv) = value.as_argv() else { continue };
        info!("[{label}] spawning: {}", argv.join(" "));
        run_argv(argv, &env)?;
    }

    let tarball_names: Vec<String> = urls.iter().map(|(_, rename)| rename.to_string()).collect();
    let owned_scripts: Vec<Vec<String>> = scripts.iter().map(|s| s.to_vec()).collect();
    let owned_patches: Vec<PathBuf> = patches.iter().map(|p| p.to_path_buf()).collect();
    let cache_vars = spec.target_cache_vars(target)?;
    let cache_dir = spec.cache_dir()?;
    let build_dir = spec.build_dir()?;
    let sources_dir = spec.sources_dir()?;

    let inputs = KeyInputs {
        seed: target,
        builds: &owned_scripts,
        patches: &owned_patches,
        tarball_names: &tarball_names,
        sources_dir,
        cache_vars: &cache_vars,
        environment: &env,
    };

    if let Some(entry) = cache::lookup(cache_dir, &inputs)? {
        info!("[{label}] build of {target} cached at {}", entry.display());
        cache::unpack(build_dir, &entry)?;
    } else {
        let image_dir = tempfile::Builder::new()
            .prefix(".ubuild_image.")
            .tempdir_in(build_dir)
            .context(error::ScratchDirSnafu {
                build_dir: build_dir.to_path_buf(),
            })?;
        env.insert(
            "UBUILD_IMAGE_DIR".to_string(),
            image_dir.path().display().to_string(),
        );

        for args in &scripts {
            run_argv(args, &env)?;
        }

        let non_empty = std::fs::read_dir(image_dir.path())
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if !non_empty {
            return error::EmptyImageDirSnafu {
                target: target.to_string(),
            }
            .fail();
        }

        match cache::pack(cache_dir, image_dir.path(), &inputs)? {
            true => info!("[{label}] packed cache entry for {target}"),
            false => warn!("[{label}] failed to pack cache entry for {target}, ignoring"),
        }
    }

    for value in section.get("post") {
        let Some(argv) = value.as_argv() else { continue };
        info!("[{label}] spawning: {}", argv.join(" "));
        run_argv(argv, &env)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn write_executable(path: &Path, content: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    fn write(path: &Path, content: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn full_pipeline_runs_pkg_target_and_image_build() {
        let dir = tempdir().unwrap();
        let build_dir = dir.path().join("build");
        let cache_dir = dir.path().join("cache");
        let compile_dir = dir.path().join("compile");
        let dest_dir = dir.path().join("dest");
        let rootfs_dir = dir.path().join("rootfs");
        let initramfs_dir = dir.path().join("initramfs");
        let sources_dir = dir.path().join("sources");
        for d in [&rootfs_dir, &initramfs_dir, &sources_dir] {
            fs::create_dir_all(d).unwrap();
        }

        let build_script = dir.path().join("build.sh");
        write_executable(
            &build_script,
            "#!/bin/sh\necho built > \"$UBUILD_IMAGE_DIR/out.txt\"\n",
        );
        let build_image = dir.path().join("build_image.sh");
        write_executable(&build_image, "#!/bin/sh\nexit 0\n");

        let spec_path = dir.path().join("a.spec");
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
                build_script.display(),
            ),
        );

        let parsed = crate::spec::parser::parse(&spec_path).unwrap();
        crate::spec::validator::validate(&parsed).unwrap();

        build(&parsed, &spec_path, "a.spec").unwrap();

        let entries: Vec<_> = fs::read_dir(&cache_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn setup_clears_build_dir_contents() {
        let dir = tempdir().unwrap();
        let build_dir = dir.path().join("build");
        fs::create_dir_all(build_dir.join("stale")).unwrap();
        write(&build_dir.join("stale/file.txt"), "old");

        let cache_dir = dir.path().join("cache");
        let compile_dir = dir.path().join("compile");
        let dest_dir = dir.path().join("dest");
        let rootfs_dir = dir.path().join("rootfs");
        let initramfs_dir = dir.path().join("initramfs");
        let sources_dir = dir.path().join("sources");
        for d in [&rootfs_dir, &initramfs_dir, &sources_dir] {
            fs::create_dir_all(d).unwrap();
        }
        let build_image = dir.path().join("build_image.sh");
        write_executable(&build_image, "#!/bin/sh\nexit 0\n");

        let spec_path = dir.path().join("a.spec");
        write(
            &spec_path,
            &format!(
                "[ubuild]\nbuild_dir={}\nbuild_image={}\ncache_dir={}\ncompile_dir={}\n\
                 destination_dir={}\nimage_name=demo\ninitramfs_rootfs_dir={}\n\
                 rootfs_dir={}\nsources_dir={}\n",
                build_dir.display(),
                build_image.display(),
                cache_dir.display(),
                compile_dir.display(),
                dest_dir.display(),
                initramfs_dir.display(),
                rootfs_dir.display(),
                sources_dir.display(),
            ),
        );

        let parsed = crate::spec::parser::parse(&spec_path).unwrap();
        setup(&parsed, "a.spec").unwrap();
        assert!(!build_dir.join("stale").exists());
    }
}
