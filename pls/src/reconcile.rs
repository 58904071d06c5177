use crate::error::ReconcileError;
use crate::pin::Pin;
use lock_sync_core::{Operator, Specifier, Version};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::debug;

/// Versions one package resolved to across a venv's lock outputs: the
/// highest seen and every other distinct value
#[derive(Debug, Clone)]
pub struct Discrepancy {
    pub highest: Version,
    pub others: BTreeSet<Version>,
}

/// Packages pinned to different versions across `.lock` outputs.
///
/// Each environment's compiler ran on its own, so the same package can end
/// up on different exact versions. Comparison is limited to the lock
/// lines' resolved versions.
pub fn find_discrepancies(by_pkg: &BTreeMap<String, Vec<&Pin>>) -> BTreeMap<String, Discrepancy> {
    let mut found = BTreeMap::new();
    for (pkg_name, pins) in by_pkg {
        let mut versions: BTreeSet<Version> = BTreeSet::new();
        for pin in pins {
            // A lock line carries exactly one `==version` specifier
            if let Some(spec) = pin.specifiers.first() {
                versions.insert(spec.version.clone());
            }
        }
        if versions.len() > 1 {
            let highest = versions
                .iter()
                .next_back()
                .cloned()
                .unwrap_or_else(|| Version::new(&[0]));
            let mut others = versions;
            others.remove(&highest);
            found.insert(pkg_name.clone(), Discrepancy { highest, others });
        }
    }
    found
}

/// Choose the authoritative `(operator, version)` for one package from the
/// versions its lock outputs resolved to plus the constraints declared in
/// the source files.
///
/// Returns `None` when the declared constraints rule out every candidate;
/// the caller turns that into an unresolvable report. Specifier shapes this
/// deliberately does not attempt (`~=`, more than one distinct bound at the
/// same extremity, more than one distinct exact pin) fail fast instead of
/// guessing.
pub fn select_version(
    pkg_name: &str,
    source_pins: &[&Pin],
    highest: &Version,
    others: &BTreeSet<Version>,
) -> Result<Option<(Operator, Version)>, ReconcileError> {
    let specifiers: Vec<&Specifier> = source_pins
        .iter()
        .flat_map(|pin| pin.specifiers.iter())
        .collect();

    // ~= needs a minor-version ceiling computation we do not attempt
    if let Some(spec) = specifiers
        .iter()
        .find(|spec| spec.op == Operator::Compatible)
    {
        return Err(ReconcileError::Unsupported {
            pkg_name: pkg_name.to_string(),
            detail: format!("the compatible-release operator is not supported: {spec}"),
        });
    }

    // An explicit pin always wins, even over a higher version elsewhere
    let exacts: BTreeSet<&Version> = specifiers
        .iter()
        .filter(|spec| spec.op == Operator::Eq)
        .map(|spec| &spec.version)
        .collect();
    if exacts.len() > 1 {
        return Err(ReconcileError::Unsupported {
            pkg_name: pkg_name.to_string(),
            detail: "more than one distinct exact pin declared".to_string(),
        });
    }
    if let Some(&version) = exacts.iter().next() {
        return Ok(Some((Operator::Eq, version.clone())));
    }

    // More than one distinct bound at the same extremity is ambiguous
    let lowers: BTreeSet<String> = specifiers
        .iter()
        .filter(|spec| spec.op.is_lower_bound())
        .map(ToString::to_string)
        .collect();
    let uppers: BTreeSet<String> = specifiers
        .iter()
        .filter(|spec| spec.op.is_upper_bound())
        .map(ToString::to_string)
        .collect();
    for (bounds, extremity) in [(&lowers, "lower"), (&uppers, "upper")] {
        if bounds.len() > 1 {
            return Err(ReconcileError::Unsupported {
                pkg_name: pkg_name.to_string(),
                detail: format!(
                    "multiple {extremity} bounds declared: {}",
                    bounds.iter().cloned().collect::<Vec<_>>().join(", ")
                ),
            });
        }
    }

    // Candidates are the versions the lock outputs actually resolved to
    let mut candidates: BTreeSet<Version> = others.clone();
    candidates.insert(highest.clone());
    candidates.retain(|version| specifiers.iter().all(|spec| spec.contains(version)));

    let Some(chosen) = candidates.iter().next_back().cloned() else {
        debug!(pkg_name, "no candidate satisfies the declared constraints");
        return Ok(None);
    };

    let has_ranges = !lowers.is_empty() || !uppers.is_empty();
    let has_exclusions = specifiers.iter().any(|spec| spec.op == Operator::NotEq);
    let op = if !has_ranges && has_exclusions && chosen != *highest {
        // An exclusion knocked out the top choice; hold the line there
        Operator::Eq
    } else {
        Operator::GreaterEq
    };

    Ok(Some((op, chosen)))
}

/// A discrepancy we can fix: the nudge lines for the venv's `.unlock` and
/// `.lock` files
#[derive(Debug, Clone)]
pub struct Resolvable {
    pub venv: String,
    pub pkg_name: String,
    /// Qualifiers joined into one suffix, possibly empty
    pub qualifiers: String,
    /// e.g. `pkg>=25.0`, for `.unlock` files
    pub nudge_unlock: String,
    /// e.g. `pkg==25.0`, for `.lock` files
    pub nudge_lock: String,
}

/// A discrepancy the declared constraints rule out entirely. Carries
/// enough detail to pin by hand: the constraint sets, the versions seen,
/// and where they came from.
#[derive(Debug, Clone)]
pub struct Unresolvable {
    pub venv: String,
    pub pkg_name: String,
    pub qualifiers: String,
    /// Declared specifiers, rendered
    pub specifiers: Vec<String>,
    pub highest: Version,
    pub others: BTreeSet<Version>,
}

/// One applied (or, on a dry run, planned) line rewrite
#[derive(Debug, Clone)]
pub struct AppliedFix {
    pub venv: String,
    pub abspath: PathBuf,
    pub line: String,
}
