/*!
Per-key value mangling: turns a raw, stripped string value into a typed
[`Value`](super::Value), or `None` if the value is invalid for its key.

The mapping from key to mangler is a static table rather than a bound
method dictionary built at construction time.
*/
use super::{SectionKind, Value};
use log::warn;
use std::fs;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// The mangler variants named in the spec's per-key mangler table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mangler {
    PlainString,
    Url,
    CacheVars,
    File,
    Directory,
    CreateDirectory,
    Argv0Executable,
}

/// Look up the mangler for `key` within a section of the given `kind`,
/// returning `None` for unrecognized keys (a parse-time warning).
pub fn mangler_for(kind: SectionKind, key: &str) -> Option<Mangler> {
    use Mangler::*;
    match kind {
        SectionKind::Ubuild => Some(match key {
            "build_dir" | "cache_dir" | "compile_dir" | "destination_dir" => CreateDirectory,
            "cross_env" | "env" => File,
            "cross_post" | "cross_pre" | "post" | "pre" | "build_image" => Argv0Executable,
            "image_name" => PlainString,
            "rootfs_dir" | "initramfs_rootfs_dir" | "sources_dir" => Directory,
            "cache_vars" => CacheVars,
            _ => return None,
        }),
        SectionKind::Cross | SectionKind::Pkg => Some(match key {
            "build" | "post" | "pre" => Argv0Executable,
            "cache_vars" => CacheVars,
            "env" | "patch" => File,
            "sources" => PlainString,
            "url" => Url,
            _ => return None,
        }),
    }
}

/// Normalize `path` against `spec_dir`, then absolutize the result against
/// the current working directory if it still isn't absolute (`spec_dir`
/// itself may be relative, e.g. `.` for a spec file given as a bare
/// filename). Mirrors `os.path.abspath(os.path.normpath(os.path.join(base_dir, path)))`:
/// lexical only, no symlink resolution, no filesystem access.
fn path_normalize(spec_dir: &Path, raw: &str) -> PathBuf {
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        spec_dir.join(candidate)
    };
    absolutize(&joined)
}

fn absolutize(path: &Path) -> PathBuf {
    let anchored = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };
    normalize_lexically(&anchored)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            other => result.push(other),
        }
    }
    result
}

fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Apply `mangler` to a raw, already-stripped value. Returns `None` (with a
/// `warn!` explaining why) if the value does not mangle successfully; the
/// caller is responsible for the generic "invalid value" warning on top of
/// that.
pub fn mangle(
    mangler: Mangler,
    spec_dir: &Path,
    section: &str,
    key: &str,
    raw: &str,
) -> Option<Value> {
    match mangler {
        Mangler::PlainString => mangle_string(raw),
        Mangler::Url => mangle_url(raw),
        Mangler::CacheVars => mangle_cache_vars(raw),
        Mangler::File => mangle_file(spec_dir, section, key, raw),
        Mangler::Directory => mangle_directory(spec_dir, section, key, raw),
        Mangler::CreateDirectory => mangle_create_directory(spec_dir, section, key, raw),
        Mangler::Argv0Executable => mangle_argv0_executable(spec_dir, section, key, raw),
    }
}

fn mangle_string(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        None
    } else {
        Some(Value::String(raw.to_string()))
    }
}

fn mangle_url(raw: &str) -> Option<Value> {
    let mut parts = raw.splitn(2, char::is_whitespace);
    let url = parts.next()?.trim();
    if url.is_empty() {
        return None;
    }
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());
    let filename = match rest {
        Some(rename) => rename.to_string(),
        None => url.rsplit('/').next().unwrap_or(url).to_string(),
    };
    Some(Value::Url(url.to_string(), filename))
}

fn mangle_cache_vars(raw: &str) -> Option<Value> {
    let vars: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if vars.is_empty() {
        None
    } else {
        Some(Value::Tokens(vars))
    }
}

fn mangle_file(spec_dir: &Path, section: &str, key: &str, raw: &str) -> Option<Value> {
    let path = path_normalize(spec_dir, raw);
    if path.is_file() {
        Some(Value::File(path))
    } else {
        warn!("[{section}] {key}: not found: '{raw}'");
        None
    }
}

fn mangle_directory(spec_dir: &Path, section: &str, key: &str, raw: &str) -> Option<Value> {
    let path = path_normalize(spec_dir, raw);
    if path.is_dir() {
        Some(Value::Directory(path))
    } else {
        warn!("[{section}] {key}: not found: '{raw}'");
        None
    }
}

fn mangle_create_directory(spec_dir: &Path, section: &str, key: &str, raw: &str) -> Option<Value> {
    let path = path_normalize(spec_dir, raw);
    let result = fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(&path);
    match result {
        Ok(()) => Some(Value::Directory(path)),
        Err(err) => {
            warn!(
                "[{section}] {key}: cannot create directory '{}': {err}",
                path.display()
            );
            None
        }
    }
}

fn mangle_argv0_executable(spec_dir: &Path, section: &str, key: &str, raw: &str) -> Option<Value> {
    let args = match shell_words::split(raw) {
        Ok(args) if !args.is_empty() => args,
        _ => {
            warn!("[{section}] {key}: invalid parameter: '{raw}'");
            return None;
        }
    };

    let exe = path_normalize(spec_dir, &args[0]);
    if !is_executable(&exe) {
        warn!("[{section}] {key}: not executable: '{raw}'");
        return None;
    }

    let mut argv = vec![exe.to_string_lossy().into_owned()];
    argv.extend(args.into_iter().skip(1));
    Some(Value::Argv(argv))
}
