use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while loading, resolving, or writing requirement files
#[derive(Error, Debug)]
pub enum LockError {
    /// Declared or referenced requirement files that do not exist on disk or
    /// could not be read cleanly. A corrupt file is reported the same way as
    /// an absent one; the caller's remediation is identical.
    #[error("missing requirements file(s): {files:?}. Create them")]
    MissingRequirements { files: Vec<PathBuf> },

    #[error("venv {venv:?} is not declared under [[tool.venvs]]")]
    UnknownVenv { venv: String },

    #[error("{file:?} does not contain package {pkg_name}")]
    PackageNotFound { file: PathBuf, pkg_name: String },

    #[error("expected an absolute path, got {0:?}")]
    NotAbsolute(PathBuf),

    #[error("unsupported requirements suffix, expecting .in, .lock, or .unlock: {0:?}")]
    UnsupportedSuffix(PathBuf),

    #[error("venv base folder does not exist: {0:?}. Create it")]
    VenvDirMissing(PathBuf),

    #[error("failed to read {path:?}")]
    PyProjectRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}")]
    PyProjectParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures raised while reconciling version discrepancies.
///
/// Kept apart from [`LockError`]: the remediation here is a manual pin, not
/// a filesystem fix, so callers must be able to tell the two apart.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("unsupported specifier combination for {pkg_name}: {detail}")]
    Unsupported { pkg_name: String, detail: String },
}
