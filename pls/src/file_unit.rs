use crate::error::LockError;
use crate::parsers::{IncludeKind, ParsedLine, parse_line};
use crate::pin::Pin;
use crate::util::{self, ReqSuffix};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One requirement file (`.in`, `.lock`, or `.unlock`) and everything
/// parsed out of it.
///
/// References to other files start out pending, stored as written
/// (relative to this file). They drain during graph resolution; a file
/// with an empty pending set is resolved and never mutated again.
#[derive(Debug, Clone)]
pub struct ReqFile {
    abspath: PathBuf,
    suffix: ReqSuffix,
    pins: Vec<Pin>,
    /// Pending `-c` references
    constraints: BTreeSet<String>,
    /// Pending `-r` references
    requirements: BTreeSet<String>,
    /// Package lines merged in from resolved requirement references
    inherited: BTreeSet<String>,
    /// Pins pulled from resolved constraint references; these restrict
    /// versions but never join the package set
    constraint_pins: Vec<Pin>,
}

impl ReqFile {
    /// Parse a requirement file from disk.
    ///
    /// The path must be absolute with a supported suffix. A reference to a
    /// file that does not exist yet is not an error here; that is deferred
    /// to resolution. An unreadable file reports as missing.
    pub fn parse(abspath: &Path) -> Result<Self, LockError> {
        if !abspath.is_absolute() {
            return Err(LockError::NotAbsolute(abspath.to_path_buf()));
        }
        let suffix = util::check_suffix(abspath)?;
        let content = fs::read_to_string(abspath).map_err(|err| {
            debug!(path = %abspath.display(), %err, "requirement file not readable");
            LockError::MissingRequirements {
                files: vec![abspath.to_path_buf()],
            }
        })?;
        Self::from_content(abspath, suffix, &content)
    }

    fn from_content(abspath: &Path, suffix: ReqSuffix, content: &str) -> Result<Self, LockError> {
        let mut pins: Vec<Pin> = Vec::new();
        let mut constraints = BTreeSet::new();
        let mut requirements = BTreeSet::new();

        for line in content.lines() {
            match parse_line(line) {
                ParsedLine::Skip => {}
                ParsedLine::Include { kind, path } => {
                    match kind {
                        IncludeKind::Constraint => constraints.insert(path),
                        IncludeKind::Requirement => requirements.insert(path),
                    };
                }
                ParsedLine::Requirement(req) => {
                    let pin = Pin::new(abspath, req)?;
                    // Exact duplicates collapse to one entry
                    if !pins.contains(&pin) {
                        pins.push(pin);
                    }
                }
            }
        }

        pins.sort_by_key(|pin| (pin.pkg_name.clone(), pin.qualifiers_key()));

        Ok(Self {
            abspath: abspath.to_path_buf(),
            suffix,
            pins,
            constraints,
            requirements,
            inherited: BTreeSet::new(),
            constraint_pins: Vec::new(),
        })
    }

    pub fn abspath(&self) -> &Path {
        &self.abspath
    }

    pub fn suffix(&self) -> ReqSuffix {
        self.suffix
    }

    pub fn file_name(&self) -> &str {
        self.abspath
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn constraint_pins(&self) -> &[Pin] {
        &self.constraint_pins
    }

    /// Count of unresolved references; zero means fully resolved
    pub fn pending(&self) -> usize {
        self.constraints.len() + self.requirements.len()
    }

    pub fn is_resolved(&self) -> bool {
        self.pending() == 0
    }

    /// Pending references with their kinds, constraints first
    pub fn pending_references(&self) -> impl Iterator<Item = (&str, IncludeKind)> {
        self.constraints
            .iter()
            .map(|reference| (reference.as_str(), IncludeKind::Constraint))
            .chain(
                self.requirements
                    .iter()
                    .map(|reference| (reference.as_str(), IncludeKind::Requirement)),
            )
    }

    pub fn has_pkg(&self, pkg_name: &str) -> bool {
        self.pins.iter().any(|pin| pin.pkg_name == pkg_name)
    }

    /// All pins for one package. Absence is a lookup error, distinct from
    /// a package present with zero specifiers.
    pub fn pins_for(&self, pkg_name: &str) -> Result<Vec<&Pin>, LockError> {
        let found: Vec<&Pin> = self
            .pins
            .iter()
            .filter(|pin| pin.pkg_name == pkg_name)
            .collect();
        if found.is_empty() {
            return Err(LockError::PackageNotFound {
                file: self.abspath.clone(),
                pkg_name: pkg_name.to_string(),
            });
        }
        Ok(found)
    }

    /// Fold a resolved requirement reference into this file's package set
    pub(crate) fn resolve_requirement(&mut self, reference: &str, lines: &BTreeSet<String>) {
        self.requirements.remove(reference);
        self.inherited.extend(lines.iter().cloned());
    }

    /// Fold a resolved constraint reference in. Constraint packages
    /// restrict versions only; they are never emitted.
    pub(crate) fn resolve_constraint(&mut self, reference: &str, pins: &[Pin]) {
        self.constraints.remove(reference);
        for pin in pins {
            if !self.constraint_pins.contains(pin) {
                self.constraint_pins.push(pin.clone());
            }
        }
    }

    /// Own package lines plus everything inherited, sorted for stable
    /// write-back
    pub fn output_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.pins.iter().map(Pin::render).collect();
        lines.extend(self.inherited.iter().cloned());
        lines.sort();
        lines.dedup();
        lines
    }

    /// Folder depth below `base`; the primary ordering key
    pub fn depth_below(&self, base: &Path) -> usize {
        util::depth_below(&self.abspath, base)
    }
}

impl PartialEq for ReqFile {
    fn eq(&self, other: &Self) -> bool {
        self.abspath == other.abspath
    }
}

impl Eq for ReqFile {}

/// Shallower directories sort first, then file name, then full path.
/// This fixes the processing and write order, and which file wins when the
/// same package is pinned in siblings.
impl Ord for ReqFile {
    fn cmp(&self, other: &Self) -> Ordering {
        let depth_self = self.abspath.components().count();
        let depth_other = other.abspath.components().count();
        depth_self
            .cmp(&depth_other)
            .then_with(|| self.file_name().cmp(other.file_name()))
            .then_with(|| self.abspath.cmp(&other.abspath))
    }
}

impl PartialOrd for ReqFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
