use crate::error::LockError;
use crate::file_unit::ReqFile;
use crate::parsers::IncludeKind;
use crate::pin::Pin;
use crate::util::{self, ReqSuffix, is_shared};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Requirement files as nodes of a reference graph, resolved by a worklist
/// fixed point.
///
/// Units live in an arena and are addressed by index; edges are path
/// strings until the referenced file is loaded. Every unit is in exactly
/// one of `resolved`/`unresolved` and only ever moves unresolved→resolved.
#[derive(Debug)]
pub struct ReqGraph {
    base_dir: PathBuf,
    units: Vec<ReqFile>,
    by_path: HashMap<PathBuf, usize>,
    resolved: BTreeSet<usize>,
    unresolved: BTreeSet<usize>,
}

impl ReqGraph {
    /// Parse the root files into an all-unresolved graph.
    ///
    /// Roots must exist; a root that is absent or unreadable raises the
    /// missing-requirements condition naming every such file at once.
    pub fn new(base_dir: &Path, roots: &[PathBuf]) -> Result<Self, LockError> {
        if !base_dir.is_absolute() {
            return Err(LockError::NotAbsolute(base_dir.to_path_buf()));
        }

        let mut graph = Self {
            base_dir: base_dir.to_path_buf(),
            units: Vec::new(),
            by_path: HashMap::new(),
            resolved: BTreeSet::new(),
            unresolved: BTreeSet::new(),
        };

        let mut missing = Vec::new();
        for root in roots {
            if graph.by_path.contains_key(root) {
                continue;
            }
            match ReqFile::parse(root) {
                Ok(unit) => {
                    graph.insert(unit);
                }
                Err(LockError::MissingRequirements { files }) => missing.extend(files),
                Err(other) => return Err(other),
            }
        }
        if !missing.is_empty() {
            missing.sort();
            return Err(LockError::MissingRequirements { files: missing });
        }

        Ok(graph)
    }

    fn insert(&mut self, unit: ReqFile) -> usize {
        let idx = self.units.len();
        self.by_path.insert(unit.abspath().to_path_buf(), idx);
        self.unresolved.insert(idx);
        self.units.push(unit);
        idx
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn resolved_len(&self) -> usize {
        self.resolved.len()
    }

    pub fn unresolved_len(&self) -> usize {
        self.unresolved.len()
    }

    /// Point lookup by absolute path
    pub fn get(&self, abspath: &Path) -> Option<&ReqFile> {
        self.by_path.get(abspath).map(|&idx| &self.units[idx])
    }

    /// Absolute target of a reference declared inside `unit`
    fn reference_abspath(unit: &ReqFile, reference: &str) -> PathBuf {
        let anchor = unit.abspath().parent().unwrap_or_else(|| Path::new("/"));
        util::lexical_join(anchor, reference)
    }

    /// Move every unit whose pending set drained into the resolved set
    fn move_resolved(&mut self) {
        let done: Vec<usize> = self
            .unresolved
            .iter()
            .copied()
            .filter(|&idx| self.units[idx].is_resolved())
            .collect();
        for idx in done {
            self.unresolved.remove(&idx);
            self.resolved.insert(idx);
        }
    }

    /// One pass: load referenced files discovered on disk, merge children
    /// that are resolved, then drain.
    fn resolve_pass(&mut self) {
        self.move_resolved();

        // Discovery. A file that only exists to be referenced is valid and
        // joins the graph here; one that is absent or unparsable stays a
        // pending reference for the no-progress check to report.
        let mut discovered: Vec<PathBuf> = Vec::new();
        for &idx in &self.unresolved {
            let unit = &self.units[idx];
            for (reference, _) in unit.pending_references() {
                let target = Self::reference_abspath(unit, reference);
                if !self.by_path.contains_key(&target) && !discovered.contains(&target) {
                    discovered.push(target);
                }
            }
        }
        for target in discovered {
            match ReqFile::parse(&target) {
                Ok(unit) => {
                    debug!(target = %target.display(), "discovered referenced file");
                    self.insert(unit);
                }
                Err(err) => {
                    debug!(target = %target.display(), %err, "referenced file not loadable");
                }
            }
        }

        self.move_resolved();

        // Merge references whose target resolved
        let mut merges: Vec<(usize, String, IncludeKind, usize)> = Vec::new();
        for &idx in &self.unresolved {
            let unit = &self.units[idx];
            for (reference, kind) in unit.pending_references() {
                let target = Self::reference_abspath(unit, reference);
                if let Some(&child) = self.by_path.get(&target) {
                    if self.resolved.contains(&child) {
                        merges.push((idx, reference.to_string(), kind, child));
                    }
                }
            }
        }
        for (parent, reference, kind, child) in merges {
            match kind {
                IncludeKind::Requirement => {
                    let lines: BTreeSet<String> =
                        self.units[child].output_lines().into_iter().collect();
                    self.units[parent].resolve_requirement(&reference, &lines);
                }
                IncludeKind::Constraint => {
                    let child_pins: Vec<Pin> = {
                        let child_unit = &self.units[child];
                        child_unit
                            .pins()
                            .iter()
                            .chain(child_unit.constraint_pins().iter())
                            .cloned()
                            .collect()
                    };
                    self.units[parent].resolve_constraint(&reference, &child_pins);
                }
            }
        }

        self.move_resolved();
    }

    /// Run passes until every file resolves, or a full pass makes no
    /// progress, in which case the remaining pending references name the
    /// unresolvable files. Already-resolved graphs pass through unchanged.
    pub fn resolve(&mut self) -> Result<(), LockError> {
        let mut previous = (self.unresolved.len(), self.resolved.len());
        loop {
            if self.unresolved.is_empty() {
                return Ok(());
            }

            self.resolve_pass();

            let current = (self.unresolved.len(), self.resolved.len());
            if self.unresolved.is_empty() {
                return Ok(());
            }
            if current == previous {
                let mut files: Vec<PathBuf> = Vec::new();
                for &idx in &self.unresolved {
                    let unit = &self.units[idx];
                    for (reference, _) in unit.pending_references() {
                        files.push(Self::reference_abspath(unit, reference));
                    }
                }
                files.sort();
                files.dedup();
                warn!(?files, "resolution made no progress");
                return Err(LockError::MissingRequirements { files });
            }
            previous = current;
        }
    }

    /// Resolved units in deterministic order: shallower first, then name
    pub fn resolved_units(&self) -> Vec<&ReqFile> {
        let mut units: Vec<&ReqFile> = self.resolved.iter().map(|&idx| &self.units[idx]).collect();
        units.sort();
        units
    }

    /// Consume the graph, keeping only the resolved units, ordered
    pub fn into_resolved_units(self) -> Vec<ReqFile> {
        let resolved = self.resolved;
        let mut units: Vec<ReqFile> = self
            .units
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| resolved.contains(idx))
            .map(|(_, unit)| unit)
            .collect();
        units.sort();
        units
    }

    /// Write each resolved unit's package set to the sibling path obtained
    /// by suffix substitution. Shared pins files are never rewritten;
    /// their packages belong to every venv, not to this output set.
    pub fn write(&self, suffix: ReqSuffix) -> Result<Vec<PathBuf>, LockError> {
        let mut written = Vec::new();
        for unit in self.resolved_units() {
            let name = unit.file_name();
            if name.starts_with("pins") && is_shared(name) {
                continue;
            }
            let lines = unit.output_lines();
            if lines.is_empty() {
                continue;
            }

            let target = util::replace_suffix_last(unit.abspath(), suffix.as_str())?;
            let mut contents = lines.join("\n");
            contents.push('\n');
            fs::write(&target, contents).map_err(|source| LockError::Write {
                path: target.clone(),
                source,
            })?;
            written.push(target);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        path
    }

    /// Three files: two without references, one constraining another.
    /// The independent pair resolves on the first pass, the third right
    /// after.
    #[test]
    fn test_resolution_two_passes() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let prod = write_file(base, "prod.in", "attrs>=23.0\n");
        let pins = write_file(base, "pins.in", "pip<25\n");
        let pip = write_file(base, "pip.in", "-c pins.in\npip\n");

        let mut graph = ReqGraph::new(base, &[prod, pins, pip]).unwrap();
        assert_eq!(graph.unresolved_len(), 3);

        graph.resolve().unwrap();
        assert_eq!(graph.unresolved_len(), 0);
        assert_eq!(graph.resolved_len(), 3);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let prod = write_file(base, "prod.in", "attrs>=23.0\n");
        let dev = write_file(base, "dev.in", "-r prod.in\nblack\n");

        let mut graph = ReqGraph::new(base, &[prod, dev.clone()]).unwrap();
        graph.resolve().unwrap();
        let first: Vec<String> = graph.get(&dev).unwrap().output_lines();

        graph.resolve().unwrap();
        let second: Vec<String> = graph.get(&dev).unwrap().output_lines();
        assert_eq!(first, second);
        assert_eq!(graph.resolved_len(), 2);
    }

    #[test]
    fn test_requirement_reference_merges_packages() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let prod = write_file(base, "prod.in", "attrs>=23.0\nurllib3<3\n");
        let dev = write_file(base, "dev.in", "-r prod.in\nblack>=24.0\n");

        let mut graph = ReqGraph::new(base, &[prod, dev.clone()]).unwrap();
        graph.resolve().unwrap();

        let lines = graph.get(&dev).unwrap().output_lines();
        assert_eq!(
            lines,
            vec![
                "attrs>=23.0".to_string(),
                "black>=24.0".to_string(),
                "urllib3<3".to_string(),
            ]
        );
    }

    #[test]
    fn test_constraint_reference_restricts_only() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let pins = write_file(base, "pins.in", "typing-extensions<4.12\n");
        let pip = write_file(base, "pip.in", "-c pins.in\npip\n");

        let mut graph = ReqGraph::new(base, &[pins, pip.clone()]).unwrap();
        graph.resolve().unwrap();

        let unit = graph.get(&pip).unwrap();
        assert_eq!(unit.output_lines(), vec!["pip".to_string()]);
        assert_eq!(unit.constraint_pins().len(), 1);
    }

    /// A constraint target that is never given as a root still resolves,
    /// as long as it exists on disk.
    #[test]
    fn test_discovered_reference_resolves() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        write_file(base, "pins.in", "pip<25\n");
        let pip = write_file(base, "pip.in", "-c pins.in\npip\n");

        let mut graph = ReqGraph::new(base, &[pip]).unwrap();
        graph.resolve().unwrap();
        assert_eq!(graph.resolved_len(), 2);
    }

    #[test]
    fn test_chained_references_resolve() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let a = write_file(base, "a.in", "attrs\n");
        let b = write_file(base, "b.in", "-r a.in\nblack\n");
        let c = write_file(base, "c.in", "-r b.in\nclick\n");

        let mut graph = ReqGraph::new(base, &[c.clone(), b, a]).unwrap();
        graph.resolve().unwrap();

        let lines = graph.get(&c).unwrap().output_lines();
        assert_eq!(lines, vec!["attrs", "black", "click"]);
    }

    #[test]
    fn test_missing_reference_names_the_file() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let pip = write_file(base, "pip.in", "-c never-created.in\npip\n");

        let mut graph = ReqGraph::new(base, &[pip]).unwrap();
        let err = graph.resolve();
        match err {
            Err(LockError::MissingRequirements { files }) => {
                assert_eq!(files, vec![base.join("never-created.in")]);
            }
            other => panic!("expected missing requirements, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_reported_as_unresolvable() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let a = write_file(base, "a.in", "-r b.in\nattrs\n");
        write_file(base, "b.in", "-r a.in\nblack\n");

        let mut graph = ReqGraph::new(base, &[a]).unwrap();
        let err = graph.resolve();
        assert!(matches!(err, Err(LockError::MissingRequirements { .. })));
    }

    #[test]
    fn test_missing_root_fails_at_construction() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let ghost = base.join("ghost.in");

        let err = ReqGraph::new(base, &[ghost.clone()]);
        match err {
            Err(LockError::MissingRequirements { files }) => assert_eq!(files, vec![ghost]),
            other => panic!("expected missing requirements, got {other:?}"),
        }
    }

    #[test]
    fn test_write_unlock_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let prod = write_file(base, "prod.in", "urllib3<3\nattrs>=23.0\n");

        let mut graph = ReqGraph::new(base, &[prod]).unwrap();
        graph.resolve().unwrap();

        let written = graph.write(ReqSuffix::Unlock).unwrap();
        assert_eq!(written, vec![base.join("prod.unlock")]);
        let first = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(first, "attrs>=23.0\nurllib3<3\n");

        graph.write(ReqSuffix::Unlock).unwrap();
        let second = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_skips_shared_pins() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let pins = write_file(base, "pins.shared.in", "pip<25\n");
        let prod = write_file(base, "prod.in", "attrs>=23.0\n");

        let mut graph = ReqGraph::new(base, &[pins, prod]).unwrap();
        graph.resolve().unwrap();

        let written = graph.write(ReqSuffix::Unlock).unwrap();
        assert_eq!(written, vec![base.join("prod.unlock")]);
        assert!(!base.join("pins.shared.unlock").exists());
    }

    /// Round trip: parsing a generated output file and re-serializing
    /// yields the same text.
    #[test]
    fn test_output_round_trip() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        let prod = write_file(
            base,
            "prod.in",
            "attrs>=23.0\ncolorama>=0.4.6; platform_system==\"Windows\"\n",
        );

        let mut graph = ReqGraph::new(base, &[prod]).unwrap();
        graph.resolve().unwrap();
        let written = graph.write(ReqSuffix::Unlock).unwrap();
        let first = fs::read_to_string(&written[0]).unwrap();

        let reparsed = ReqFile::parse(&written[0]).unwrap();
        let mut second = reparsed.output_lines().join("\n");
        second.push('\n');
        assert_eq!(first, second);
    }
}
