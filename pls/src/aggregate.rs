use crate::collection::ReqGraph;
use crate::error::LockError;
use crate::file_unit::ReqFile;
use crate::pin::Pin;
use crate::util::ReqSuffix;
use crate::venvs::VenvMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Every requirement file loaded for one venv and one suffix class,
/// including files pulled in transitively through `-r`/`-c` references.
///
/// Iteration is restartable: each call hands out a fresh cursor over the
/// same ordered units.
#[derive(Debug)]
pub struct VenvPins {
    venv: String,
    units: Vec<ReqFile>,
}

impl VenvPins {
    /// Load all of a venv's requirement files for `suffix`.
    ///
    /// `.in` sources go through graph resolution to close over their
    /// references; `.lock`/`.unlock` outputs are already flat. A declared
    /// file that is absent or cannot be read surfaces as the
    /// missing-requirements condition either way.
    pub fn load(map: &VenvMap, venv: &str, suffix: ReqSuffix) -> Result<Self, LockError> {
        let key = map.normalize_key(venv);
        let roots = map.req_abspaths(&key, suffix)?;
        debug!(venv = %key, %suffix, roots = roots.len(), "loading venv requirements");

        let units = match suffix {
            ReqSuffix::In => {
                let mut graph = ReqGraph::new(map.project_base(), &roots)?;
                graph.resolve()?;
                graph.into_resolved_units()
            }
            ReqSuffix::Lock | ReqSuffix::Unlock => {
                let mut units = Vec::new();
                let mut missing = Vec::new();
                for root in &roots {
                    match ReqFile::parse(root) {
                        Ok(unit) => units.push(unit),
                        Err(LockError::MissingRequirements { files }) => missing.extend(files),
                        Err(other) => return Err(other),
                    }
                }
                if !missing.is_empty() {
                    missing.sort();
                    return Err(LockError::MissingRequirements { files: missing });
                }
                units.sort();
                units
            }
        };

        Ok(Self { venv: key, units })
    }

    pub fn venv(&self) -> &str {
        &self.venv
    }

    /// Count of package-owning file units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Containment test by absolute path
    pub fn contains(&self, abspath: &Path) -> bool {
        self.units.iter().any(|unit| unit.abspath() == abspath)
    }

    /// Point lookup by absolute path
    pub fn get(&self, abspath: &Path) -> Option<&ReqFile> {
        self.units.iter().find(|unit| unit.abspath() == abspath)
    }

    /// Fresh iterator over the ordered units
    pub fn iter(&self) -> std::slice::Iter<'_, ReqFile> {
        self.units.iter()
    }

    /// All pins grouped by package name, with files visited in their
    /// deterministic order
    pub fn by_pkg(&self) -> BTreeMap<String, Vec<&Pin>> {
        let mut grouped: BTreeMap<String, Vec<&Pin>> = BTreeMap::new();
        for unit in &self.units {
            for pin in unit.pins() {
                grouped.entry(pin.pkg_name.clone()).or_default().push(pin);
            }
        }
        grouped
    }

    /// Pins for one package across every unit, declared constraint pins
    /// included; empty when the package is nowhere mentioned
    pub fn pins_for(&self, pkg_name: &str) -> Vec<&Pin> {
        let mut found = Vec::new();
        for unit in &self.units {
            found.extend(unit.pins().iter().filter(|pin| pin.pkg_name == pkg_name));
            found.extend(
                unit.constraint_pins()
                    .iter()
                    .filter(|pin| pin.pkg_name == pkg_name),
            );
        }
        found
    }
}

impl<'a> IntoIterator for &'a VenvPins {
    type Item = &'a ReqFile;
    type IntoIter = std::slice::Iter<'a, ReqFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// Resolve and write `.unlock` files for one venv, or for every declared
/// venv when none is given. Returns the written paths.
pub fn unlock_compile(map: &VenvMap, venv: Option<&str>) -> Result<Vec<PathBuf>, LockError> {
    let venvs: Vec<String> = match venv {
        Some(venv) => vec![map.normalize_key(venv)],
        None => map.venv_relpaths().map(str::to_string).collect(),
    };

    let mut written = Vec::new();
    for venv in &venvs {
        let roots = map.req_abspaths(venv, ReqSuffix::In)?;
        let mut graph = ReqGraph::new(map.project_base(), &roots)?;
        graph.resolve()?;
        written.extend(graph.write(ReqSuffix::Unlock)?);
    }
    written.sort();
    written.dedup();
    Ok(written)
}
