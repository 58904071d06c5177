use crate::aggregate::VenvPins;
use crate::error::{LockError, ReconcileError};
use crate::parsers::normalize_name;
use crate::pin::Pin;
use crate::reconcile::{AppliedFix, Resolvable, Unresolvable, find_discrepancies, select_version};
use crate::util::{SUFFIX_UNLOCK, ReqSuffix, is_shared, replace_suffix_last};
use crate::venvs::VenvMap;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Outcome of a fix run over one venv
#[derive(Debug, Default)]
pub struct FixOutcome {
    /// Line rewrites performed, or planned on a dry run
    pub applied: Vec<AppliedFix>,
    pub resolvables: Vec<Resolvable>,
    /// Resolvables touching `.shared` files; they affect every venv
    pub resolvable_shared: Vec<Resolvable>,
    pub unresolvables: Vec<Unresolvable>,
    /// Packages whose declared specifiers we refuse to reconcile; fix by hand
    pub unsupported: Vec<(String, ReconcileError)>,
}

impl FixOutcome {
    pub fn is_clean(&self) -> bool {
        self.applied.is_empty() && self.unresolvables.is_empty() && self.unsupported.is_empty()
    }
}

/// Reconciles version discrepancies across one venv's `.lock` outputs and
/// nudges the affected `.lock`/`.unlock` lines back into agreement.
#[derive(Debug)]
pub struct Fixer {
    venv: String,
    locks: VenvPins,
    sources: VenvPins,
}

impl Fixer {
    /// Load the venv's `.lock` outputs and its transitively resolved `.in`
    /// sources, which carry the authoritative declared constraints
    pub fn new(map: &VenvMap, venv: &str) -> Result<Self, LockError> {
        let locks = VenvPins::load(map, venv, ReqSuffix::Lock)?;
        let sources = VenvPins::load(map, venv, ReqSuffix::In)?;
        Ok(Self {
            venv: map.normalize_key(venv),
            locks,
            sources,
        })
    }

    pub fn venv(&self) -> &str {
        &self.venv
    }

    /// Detect discrepancies and choose one version per affected package
    pub fn issues(
        &self,
    ) -> (
        Vec<Resolvable>,
        Vec<Unresolvable>,
        Vec<(String, ReconcileError)>,
    ) {
        let by_pkg = self.locks.by_pkg();
        let discrepancies = find_discrepancies(&by_pkg);

        let mut resolvables = Vec::new();
        let mut unresolvables = Vec::new();
        let mut unsupported = Vec::new();

        for (pkg_name, issue) in &discrepancies {
            let source_pins: Vec<&Pin> = self.sources.pins_for(pkg_name);
            let qualifiers = first_qualifiers(&source_pins);

            match select_version(pkg_name, &source_pins, &issue.highest, &issue.others) {
                Ok(Some((op, version))) => {
                    let suffix = if qualifiers.is_empty() {
                        String::new()
                    } else {
                        format!("; {qualifiers}")
                    };
                    debug!(%pkg_name, %op, %version, "reconciled");
                    resolvables.push(Resolvable {
                        venv: self.venv.clone(),
                        pkg_name: pkg_name.clone(),
                        qualifiers: qualifiers.clone(),
                        nudge_unlock: format!("{pkg_name}{op}{version}{suffix}"),
                        nudge_lock: format!("{pkg_name}=={version}{suffix}"),
                    });
                }
                Ok(None) => {
                    unresolvables.push(Unresolvable {
                        venv: self.venv.clone(),
                        pkg_name: pkg_name.clone(),
                        qualifiers,
                        specifiers: source_pins
                            .iter()
                            .flat_map(|pin| pin.specifiers.iter())
                            .map(ToString::to_string)
                            .collect(),
                        highest: issue.highest.clone(),
                        others: issue.others.clone(),
                    });
                }
                Err(err) => {
                    warn!(%pkg_name, %err, "refusing to reconcile");
                    unsupported.push((pkg_name.clone(), err));
                }
            }
        }

        (resolvables, unresolvables, unsupported)
    }

    /// Apply every resolvable nudge. Each `.lock` file owning the package
    /// gets the exact pin; its sibling `.unlock` file gets the operator
    /// form. On a dry run nothing is written but the plan is returned.
    pub fn apply(&self, dry_run: bool) -> Result<FixOutcome, LockError> {
        let (resolvables, unresolvables, unsupported) = self.issues();
        let mut outcome = FixOutcome {
            unresolvables,
            unsupported,
            ..Default::default()
        };

        for resolvable in resolvables {
            let mut touches_shared = false;
            for unit in self.locks.iter() {
                if !unit.has_pkg(&resolvable.pkg_name) {
                    continue;
                }
                touches_shared = touches_shared || is_shared(unit.file_name());

                let lock_path = unit.abspath();
                if !dry_run {
                    write_nudge(lock_path, &resolvable.pkg_name, &resolvable.nudge_lock)?;
                }
                outcome.applied.push(AppliedFix {
                    venv: self.venv.clone(),
                    abspath: lock_path.to_path_buf(),
                    line: resolvable.nudge_lock.clone(),
                });

                let unlock_path = replace_suffix_last(lock_path, SUFFIX_UNLOCK)?;
                if unlock_path.is_file() {
                    if !dry_run {
                        write_nudge(&unlock_path, &resolvable.pkg_name, &resolvable.nudge_unlock)?;
                    }
                    outcome.applied.push(AppliedFix {
                        venv: self.venv.clone(),
                        abspath: unlock_path,
                        line: resolvable.nudge_unlock.clone(),
                    });
                }
            }

            if touches_shared {
                outcome.resolvable_shared.push(resolvable);
            } else {
                outcome.resolvables.push(resolvable);
            }
        }

        Ok(outcome)
    }
}

/// Qualifiers of the first source pin carrying any. Source pins arrive in
/// file order (shallower and alphabetically-first files first), so repeated
/// runs pick the same source of truth.
fn first_qualifiers(pins: &[&Pin]) -> String {
    pins.iter()
        .find(|pin| !pin.qualifiers.is_empty())
        .map(|pin| pin.qualifiers_key())
        .unwrap_or_default()
}

fn pkg_head() -> &'static Regex {
    static PKG_HEAD: OnceLock<Regex> = OnceLock::new();
    PKG_HEAD.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*").expect("package head pattern is valid")
    })
}

/// Exact package name at the head of a `.lock`/`.unlock` line, or None.
/// Exactness matters: a desired `tox` must never match `tox-gh-actions`.
pub fn extract_pkg_name(line: &str, desired: &str) -> Option<String> {
    let head = pkg_head().find(line)?.as_str();
    if normalize_name(head) == normalize_name(desired) {
        Some(normalize_name(head))
    } else {
        None
    }
}

/// Replace the package's line in the file, or append when absent.
/// Comments and other packages pass through untouched.
pub fn write_nudge(path: &Path, pkg_name: &str, nudge_line: &str) -> Result<(), LockError> {
    let content = fs::read_to_string(path).map_err(|_| LockError::MissingRequirements {
        files: vec![path.to_path_buf()],
    })?;

    let mut out: Vec<String> = Vec::new();
    let mut found = false;
    for line in content.lines() {
        let is_comment = line.starts_with('#');
        let is_blank = line.trim().is_empty();
        let is_match =
            !is_comment && !is_blank && extract_pkg_name(line, pkg_name).is_some();
        if is_match {
            found = true;
            out.push(nudge_line.to_string());
        } else {
            out.push(line.to_string());
        }
    }
    if !found {
        out.push(nudge_line.to_string());
    }

    let mut contents = out.join("\n");
    contents.push('\n');
    fs::write(path, contents).map_err(|source| LockError::Write {
        path: path.to_path_buf(),
        source,
    })
}
