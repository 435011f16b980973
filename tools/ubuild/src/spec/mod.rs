/*!
The parsed representation of a `.spec` file: an ordered mapping from section
name to an ordered, multi-valued key/value body.

Parsing lives in [`parser`], per-key value mangling in [`mangle`], and
cross-section arity checks in [`validator`]. This module only owns the data
model and the read-only accessors the rest of the crate uses once a `Spec`
has been parsed and validated.
*/
pub(crate) mod error;
pub mod mangle;
pub mod parser;
pub mod validator;

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

pub use error::Error;
type Result<T> = std::result::Result<T, Error>;

/// One value produced by a mangler for a single key occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// A plain, non-empty string.
    String(String),
    /// An argv vector whose first element is an absolute, executable file.
    Argv(Vec<String>),
    /// An absolute path to an existing regular file.
    File(PathBuf),
    /// An absolute path to an existing (or freshly created) directory.
    Directory(PathBuf),
    /// Whitespace-split tokens, e.g. `cache_vars`.
    Tokens(Vec<String>),
    /// A `(url, local_filename)` pair.
    Url(String, String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::File(p) | Value::Directory(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_argv(&self) -> Option<&[String]> {
        match self {
            Value::Argv(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tokens(&self) -> Option<&[String]> {
        match self {
            Value::Tokens(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<(&str, &str)> {
        match self {
            Value::Url(url, filename) => Some((url, filename)),
            _ => None,
        }
    }
}

/// What kind of section a name denotes, per the `^ubuild$` / `^cross=.*` /
/// `^pkg=.*` patterns in the spec grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Ubuild,
    Cross,
    Pkg,
}

impl SectionKind {
    /// Classify a section name, returning `None` if it matches none of the
    /// recognized patterns (the section is then a parse-time warning).
    pub fn classify(name: &str) -> Option<Self> {
        if name == "ubuild" {
            Some(SectionKind::Ubuild)
        } else if name.starts_with("cross=") {
            Some(SectionKind::Cross)
        } else if name.starts_with("pkg=") {
            Some(SectionKind::Pkg)
        } else {
            None
        }
    }
}

/// One `[ubuild]`, `[cross=*]`, or `[pkg=*]` section body: an insertion
/// ordered multimap from key to the ordered list of values collected for it.
#[derive(Clone, Debug, Default)]
pub struct Section {
    kind: Option<SectionKind>,
    values: IndexMap<String, Vec<Value>>,
}

impl Section {
    fn new(kind: SectionKind) -> Self {
        Self {
            kind: Some(kind),
            values: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> Option<SectionKind> {
        self.kind
    }

    fn push(&mut self, key: &str, value: Value) {
        self.values.entry(key.to_string()).or_default().push(value);
    }

    /// All values accumulated for `key`, in source order. Empty if unset.
    pub fn get(&self, key: &str) -> &[Value] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first value for `key`, if any occurrence was recorded.
    pub fn get_one(&self, key: &str) -> Option<&Value> {
        self.get(key).first()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of occurrences recorded for `key`.
    pub fn count(&self, key: &str) -> usize {
        self.get(key).len()
    }

    /// Union of whitespace-split tokens from every `cache_vars` occurrence,
    /// deduplicated and sorted so the projection is a stable cache-key input.
    pub fn cache_vars(&self) -> Vec<String> {
        let mut vars: Vec<String> = self
            .get("cache_vars")
            .iter()
            .filter_map(Value::as_tokens)
            .flatten()
            .cloned()
            .collect();
        vars.sort();
        vars.dedup();
        vars
    }
}

/// The fully parsed spec: an insertion-ordered mapping from section name to
/// section body.
#[derive(Clone, Debug, Default)]
pub struct Spec {
    sections: IndexMap<String, Section>,
}

impl Spec {
    pub(crate) fn new() -> Self {
        Self {
            sections: IndexMap::new(),
        }
    }

    pub(crate) fn section_mut(&mut self, name: &str, kind: SectionKind) -> &mut Section {
        self.sections
            .entry(name.to_string())
            .or_insert_with(|| Section::new(kind))
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The `[ubuild]` section, required to exist by the time validation has
    /// passed.
    pub fn ubuild(&self) -> Result<&Section> {
        self.sections
            .get("ubuild")
            .ok_or_else(|| error::MissingSectionSnafu { section: "ubuild" }.build())
    }

    /// `cross=*` section names, in the order they first appeared in source.
    pub fn cross_targets(&self) -> Vec<&str> {
        self.sections
            .keys()
            .map(String::as_str)
            .filter(|name| name.starts_with("cross="))
            .collect()
    }

    /// `pkg=*` section names, in the order they first appeared in source.
    pub fn pkg_targets(&self) -> Vec<&str> {
        self.sections
            .keys()
            .map(String::as_str)
            .filter(|name| name.starts_with("pkg="))
            .collect()
    }

    /// The sorted union of the global and a target's `cache_vars`.
    pub fn target_cache_vars(&self, target: &str) -> Result<Vec<String>> {
        let ubuild = self.ubuild()?;
        let target_section = self
            .section(target)
            .ok_or_else(|| error::MissingSectionSnafu { section: target }.build())?;
        let mut vars = ubuild.cache_vars();
        vars.extend(target_section.cache_vars());
        vars.sort();
        vars.dedup();
        Ok(vars)
    }

    fn ubuild_path(&self, key: &'static str) -> Result<&Path> {
        self.ubuild()?
            .get_one(key)
            .and_then(Value::as_path)
            .ok_or(
                error::MissingKeySnafu {
                    section: "ubuild".to_string(),
                    key,
                }
                .build(),
            )
    }

    fn ubuild_string(&self, key: &'static str) -> Result<&str> {
        self.ubuild()?
            .get_one(key)
            .and_then(Value::as_str)
            .ok_or(
                error::MissingKeySnafu {
                    section: "ubuild".to_string(),
                    key,
                }
                .build(),
            )
    }

    pub fn build_dir(&self) -> Result<&Path> {
        self.ubuild_path("build_dir")
    }

    pub fn cache_dir(&self) -> Result<&Path> {
        self.ubuild_path("cache_dir")
    }

    pub fn compile_dir(&self) -> Result<&Path> {
        self.ubuild_path("compile_dir")
    }

    pub fn destination_dir(&self) -> Result<&Path> {
        self.ubuild_path("destination_dir")
    }

    pub fn initramfs_rootfs_dir(&self) -> Result<&Path> {
        self.ubuild_path("initramfs_rootfs_dir")
    }

    pub fn rootfs_dir(&self) -> Result<&Path> {
        self.ubuild_path("rootfs_dir")
    }

    pub fn sources_dir(&self) -> Result<&Path> {
        self.ubuild_path("sources_dir")
    }

    pub fn image_name(&self) -> Result<&str> {
        self.ubuild_string("image_name")
    }

    pub fn build_image(&self) -> Result<&[String]> {
        self.ubuild()?
            .get_one("build_image")
            .and_then(Value::as_argv)
            .ok_or(
                error::MissingKeySnafu {
                    section: "ubuild".to_string(),
                    key: "build_image",
                }
                .build(),
            )
    }

    /// `sources` metadata for a given target section (required, arity 1).
    pub fn target_sources(&self, target: &str) -> Result<&str> {
        self.section(target)
            .ok_or_else(|| error::MissingSectionSnafu { section: target }.build())?
            .get_one("sources")
            .and_then(Value::as_str)
            .ok_or(
                error::MissingKeySnafu {
                    section: target.to_string(),
                    key: "sources",
                }
                .build(),
            )
    }
}
