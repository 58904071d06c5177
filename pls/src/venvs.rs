use crate::error::LockError;
use crate::util::{self, ReqSuffix};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `[[tool.venvs]]` array of tables as it appears in pyproject.toml
#[derive(Debug, Deserialize)]
struct PyProjectDoc {
    #[serde(default)]
    tool: ToolSection,
}

#[derive(Debug, Default, Deserialize)]
struct ToolSection {
    #[serde(default)]
    venvs: Vec<VenvTable>,
}

#[derive(Debug, Deserialize)]
struct VenvTable {
    venv_base_path: String,
    #[serde(default)]
    reqs: Vec<String>,
}

/// One declared venv: its base folder and requirement file bases, both
/// relative to the project base. Bases carry no `.in`/`.lock`/`.unlock`
/// ending.
#[derive(Debug, Clone)]
pub struct VenvEntry {
    pub venv_path: String,
    pub reqs: Vec<String>,
}

/// The venv → requirement-files mapping for one project, parsed and
/// validated once at load time.
#[derive(Debug, Clone)]
pub struct VenvMap {
    project_base: PathBuf,
    entries: Vec<VenvEntry>,
}

impl VenvMap {
    /// Load `[[tool.venvs]]` from `<project_base>/pyproject.toml`.
    ///
    /// Every declared venv base folder must exist; requirement files are
    /// not checked here (see [`VenvMap::missing`]).
    pub fn from_pyproject(project_base: &Path) -> Result<Self, LockError> {
        if !project_base.is_absolute() {
            return Err(LockError::NotAbsolute(project_base.to_path_buf()));
        }
        let path = project_base.join("pyproject.toml");
        let content = fs::read_to_string(&path).map_err(|source| LockError::PyProjectRead {
            path: path.clone(),
            source,
        })?;
        let doc: PyProjectDoc =
            toml::from_str(&content).map_err(|source| LockError::PyProjectParse { path, source })?;

        let mut entries = Vec::new();
        for table in doc.tool.venvs {
            let venv_abspath = util::lexical_join(project_base, &table.venv_base_path);
            if !venv_abspath.is_dir() {
                return Err(LockError::VenvDirMissing(venv_abspath));
            }
            debug!(venv = %table.venv_base_path, reqs = table.reqs.len(), "declared venv");
            entries.push(VenvEntry {
                venv_path: table.venv_base_path,
                reqs: table.reqs,
            });
        }

        Ok(Self {
            project_base: project_base.to_path_buf(),
            entries,
        })
    }

    pub fn project_base(&self) -> &Path {
        &self.project_base
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared venv keys, in declaration order
    pub fn venv_relpaths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.venv_path.as_str())
    }

    pub fn contains(&self, venv: &str) -> bool {
        let key = self.normalize_key(venv);
        self.entries.iter().any(|entry| entry.venv_path == key)
    }

    /// Accept a venv key in its declared relative form or as an absolute
    /// path below the project base
    pub fn normalize_key(&self, key: &str) -> String {
        let path = Path::new(key);
        if path.is_absolute() {
            match path.strip_prefix(&self.project_base) {
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => key.to_string(),
            }
        } else {
            key.to_string()
        }
    }

    fn entry(&self, venv: &str) -> Result<&VenvEntry, LockError> {
        let key = self.normalize_key(venv);
        self.entries
            .iter()
            .find(|entry| entry.venv_path == key)
            .ok_or(LockError::UnknownVenv { venv: key })
    }

    /// Requirement file bases declared for a venv
    pub fn reqs(&self, venv: &str) -> Result<&[String], LockError> {
        Ok(&self.entry(venv)?.reqs)
    }

    /// Absolute requirement paths for a venv with the suffix attached.
    /// A `.shared` marker in the base stays in place.
    pub fn req_abspaths(&self, venv: &str, suffix: ReqSuffix) -> Result<Vec<PathBuf>, LockError> {
        let entry = self.entry(venv)?;
        Ok(entry
            .reqs
            .iter()
            .map(|req| self.req_abspath(req, suffix))
            .collect())
    }

    fn req_abspath(&self, req_base: &str, suffix: ReqSuffix) -> PathBuf {
        let with_suffix = format!("{req_base}{}", suffix.as_str());
        util::lexical_join(&self.project_base, &with_suffix)
    }

    /// Declared requirement files absent on disk for any of the suffixes
    pub fn missing(&self, suffixes: &[ReqSuffix]) -> Vec<PathBuf> {
        let mut missing = Vec::new();
        for entry in &self.entries {
            for req in &entry.reqs {
                for &suffix in suffixes {
                    let path = self.req_abspath(req, suffix);
                    if !path.is_file() {
                        missing.push(path);
                    }
                }
            }
        }
        missing.sort();
        missing.dedup();
        missing
    }
}
