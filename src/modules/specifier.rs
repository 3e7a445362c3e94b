//! Import specifier classification.
//!
//! Checked in this order:
//! 1. `./`, `../`, absolute paths, or an existing file ending in `.hql`,
//!    `.js` or `.mjs`: a local module
//! 2. `npm:package[@version]`
//! 3. `jsr:@scope/package[@version]`
//! 4. `<scheme>://...`: a remote URL
//!
//! Anything else is rejected as an invalid specifier.

use crate::errors::ImportFailure;
use crate::modules::loader::SourceLoader;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

static NPM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^npm:((?:@[A-Za-z0-9._-]+/)?[A-Za-z0-9._-]+)(?:@([^/\s]+))?(/.*)?$")
        .expect("npm specifier pattern is valid")
});

static JSR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^jsr:@([A-Za-z0-9._-]+)/([A-Za-z0-9._-]+)(?:@([^/\s]+))?(/.*)?$")
        .expect("jsr specifier pattern is valid")
});

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://\S+$").expect("url pattern is valid")
});

const LOCAL_EXTENSIONS: [&str; 3] = [".hql", ".js", ".mjs"];

/// What a module is and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleKind {
    #[serde(rename = "hql")]
    LocalHql,
    #[serde(rename = "js")]
    LocalJs,
    Remote {
        url: String,
    },
    Npm {
        package: String,
        version: Option<String>,
    },
    Jsr {
        scope: String,
        package: String,
        version: Option<String>,
    },
}

impl ModuleKind {
    pub fn is_local(&self) -> bool {
        matches!(self, ModuleKind::LocalHql | ModuleKind::LocalJs)
    }

    /// Base for a generated import alias: the package or file stem.
    pub fn alias_base(&self, key: &ModuleKey) -> String {
        let raw = match self {
            ModuleKind::Npm { package, .. } | ModuleKind::Jsr { package, .. } => {
                package.rsplit('/').next().unwrap_or(package).to_string()
            }
            ModuleKind::Remote { url } => url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(url)
                .split('.')
                .next()
                .unwrap_or_default()
                .to_string(),
            ModuleKind::LocalHql | ModuleKind::LocalJs => Path::new(key.as_str())
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        sanitize_identifier(&raw)
    }
}

/// Cache key: the canonical path of a local module, or the normalized
/// specifier of a foreign one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleKey(String);

impl ModuleKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A classified specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// Canonical path of a local file, known to exist.
    Local { path: PathBuf, kind: ModuleKind },
    Foreign { key: ModuleKey, kind: ModuleKind },
}

impl Specifier {
    pub fn key(&self) -> ModuleKey {
        match self {
            Specifier::Local { path, .. } => ModuleKey::from_path(path),
            Specifier::Foreign { key, .. } => key.clone(),
        }
    }

    pub fn kind(&self) -> &ModuleKind {
        match self {
            Specifier::Local { kind, .. } | Specifier::Foreign { kind, .. } => kind,
        }
    }
}

fn is_path_like(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../") || Path::new(spec).is_absolute()
}

fn has_local_extension(spec: &str) -> bool {
    LOCAL_EXTENSIONS.iter().any(|ext| spec.ends_with(ext))
}

fn invalid(reason: impl Into<String>) -> ImportFailure {
    ImportFailure::InvalidSpecifier {
        reason: reason.into(),
    }
}

/// Classifies `spec` as written in a module located in `importer_dir`.
pub fn classify(
    spec: &str,
    importer_dir: &Path,
    loader: &dyn SourceLoader,
) -> Result<Specifier, ImportFailure> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(invalid("empty specifier"));
    }

    let candidate = importer_dir.join(spec);
    if is_path_like(spec) || (has_local_extension(spec) && loader.exists(&candidate)) {
        return classify_local(spec, &candidate, loader);
    }

    if spec.starts_with("npm:") {
        let caps = NPM
            .captures(spec)
            .ok_or_else(|| invalid(format!("malformed npm specifier '{}'", spec)))?;
        return Ok(Specifier::Foreign {
            key: ModuleKey::new(spec),
            kind: ModuleKind::Npm {
                package: caps[1].to_string(),
                version: caps.get(2).map(|m| m.as_str().to_string()),
            },
        });
    }

    if spec.starts_with("jsr:") {
        let caps = JSR.captures(spec).ok_or_else(|| {
            invalid(format!(
                "jsr specifier '{}' must have the form jsr:@scope/package",
                spec
            ))
        })?;
        return Ok(Specifier::Foreign {
            key: ModuleKey::new(spec),
            kind: ModuleKind::Jsr {
                scope: caps[1].to_string(),
                package: caps[2].to_string(),
                version: caps.get(3).map(|m| m.as_str().to_string()),
            },
        });
    }

    if URL.is_match(spec) {
        return Ok(Specifier::Foreign {
            key: ModuleKey::new(spec),
            kind: ModuleKind::Remote {
                url: spec.to_string(),
            },
        });
    }

    Err(invalid(format!(
        "'{}' is not a relative path, npm:, jsr: or URL specifier",
        spec
    )))
}

fn classify_local(
    spec: &str,
    candidate: &Path,
    loader: &dyn SourceLoader,
) -> Result<Specifier, ImportFailure> {
    let kind = if spec.ends_with(".hql") {
        ModuleKind::LocalHql
    } else if spec.ends_with(".js") || spec.ends_with(".mjs") {
        ModuleKind::LocalJs
    } else {
        return Err(invalid(format!(
            "local module '{}' must end in .hql, .js or .mjs",
            spec
        )));
    };
    if !loader.exists(candidate) {
        return Err(ImportFailure::NotFound {
            path: candidate.display().to_string(),
        });
    }
    let path = loader
        .canonicalize(candidate)
        .map_err(|err| ImportFailure::ReadFailed {
            path: candidate.display().to_string(),
            message: err.to_string(),
        })?;
    Ok(Specifier::Local { path, kind })
}

/// Turns an arbitrary name into a JavaScript identifier.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
