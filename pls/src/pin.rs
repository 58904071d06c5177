use crate::error::LockError;
use crate::parsers::ReqLine;
use lock_sync_core::Specifier;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// One package requirement parsed out of a single file.
///
/// Identity is `(file, package, qualifiers)`: the same package can appear
/// several times in one file with different environment markers.
#[derive(Debug, Clone)]
pub struct Pin {
    file_abspath: PathBuf,
    /// Package name, normalized
    pub pkg_name: String,
    /// Requirement text as written, qualifiers included
    pub line: String,
    pub specifiers: Vec<Specifier>,
    /// Environment markers, stored without the `;` separators
    pub qualifiers: Vec<String>,
    /// `pkg @ url` reference, passed through untouched
    pub remote: bool,
}

impl Pin {
    pub fn new(file_abspath: &Path, req: ReqLine) -> Result<Self, LockError> {
        if !file_abspath.is_absolute() {
            return Err(LockError::NotAbsolute(file_abspath.to_path_buf()));
        }
        Ok(Self {
            file_abspath: file_abspath.to_path_buf(),
            pkg_name: req.name,
            line: req.raw,
            specifiers: req.specifiers,
            qualifiers: req.qualifiers,
            remote: req.remote,
        })
    }

    pub fn file_abspath(&self) -> &Path {
        &self.file_abspath
    }

    /// A pin constrains versions. A bare `isort` line is not a pin
    pub fn is_pin(&self) -> bool {
        !self.specifiers.is_empty()
    }

    /// Trackable entries carry specifiers or qualifiers; both predicates
    /// matter and they are not the same thing
    pub fn is_trackable(&self) -> bool {
        !self.specifiers.is_empty() || !self.qualifiers.is_empty()
    }

    /// Qualifiers joined into one string, for identity and ordering
    pub fn qualifiers_key(&self) -> String {
        self.qualifiers.join("; ")
    }

    /// Normalized output line: name, specifiers, then qualifiers.
    /// Remote references keep their original text.
    pub fn render(&self) -> String {
        if self.remote {
            return self.line.clone();
        }
        let specs = self
            .specifiers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut out = format!("{}{}", self.pkg_name, specs);
        if !self.qualifiers.is_empty() {
            out.push_str("; ");
            out.push_str(&self.qualifiers_key());
        }
        out
    }
}

impl PartialEq for Pin {
    fn eq(&self, other: &Self) -> bool {
        self.file_abspath == other.file_abspath
            && self.pkg_name == other.pkg_name
            && self.qualifiers == other.qualifiers
    }
}

impl Eq for Pin {}

/// Pins order by file path, then package name, then qualifier text.
/// Pins from different files with different package names have no defined
/// order; comparing them is a usage error and yields `None`.
impl PartialOrd for Pin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.file_abspath == other.file_abspath {
            Some(
                self.pkg_name
                    .cmp(&other.pkg_name)
                    .then_with(|| self.qualifiers_key().cmp(&other.qualifiers_key())),
            )
        } else if self.pkg_name == other.pkg_name {
            Some(
                self.file_abspath
                    .cmp(&other.file_abspath)
                    .then_with(|| self.qualifiers_key().cmp(&other.qualifiers_key())),
            )
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{ParsedLine, parse_line};

    fn pin(file: &str, line: &str) -> Pin {
        match parse_line(line) {
            ParsedLine::Requirement(req) => Pin::new(Path::new(file), req).unwrap(),
            other => panic!("expected a requirement, got {other:?}"),
        }
    }

    #[test]
    fn test_predicates_are_distinct() {
        let bare = pin("/p/prod.in", "isort");
        assert!(!bare.is_pin());
        assert!(!bare.is_trackable());

        let marker_only = pin("/p/prod.in", "tomli; python_version<\"3.11\"");
        assert!(!marker_only.is_pin());
        assert!(marker_only.is_trackable());

        let pinned = pin("/p/prod.in", "pip>=24.2");
        assert!(pinned.is_pin());
        assert!(pinned.is_trackable());
    }

    #[test]
    fn test_relative_path_rejected() {
        let req = match parse_line("pip>=24.2") {
            ParsedLine::Requirement(req) => req,
            other => panic!("expected a requirement, got {other:?}"),
        };
        let err = Pin::new(Path::new("prod.in"), req);
        assert!(matches!(err, Err(LockError::NotAbsolute(_))));
    }

    #[test]
    fn test_identity_ignores_specifiers() {
        let a = pin("/p/prod.in", "pip>=24.2");
        let b = pin("/p/prod.in", "pip<25");
        assert_eq!(a, b);

        let c = pin("/p/dev.in", "pip>=24.2");
        assert_ne!(a, c);
    }

    #[test]
    fn test_ordering_within_one_file() {
        let a = pin("/p/prod.in", "attrs>=23.0");
        let b = pin("/p/prod.in", "pip>=24.2");
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_ordering_same_package_across_files() {
        let a = pin("/p/a.lock", "pip==25.0");
        let b = pin("/p/b.lock", "pip==24.8");
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_cross_file_different_packages_not_comparable() {
        let a = pin("/p/a.in", "attrs>=23.0");
        let b = pin("/p/b.in", "pip>=24.2");
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn test_render_round_trip() {
        let source = "colorama>=0.4.6; platform_system==\"Windows\"";
        let first = pin("/p/prod.in", source).render();
        let second = pin("/p/prod.in", &first).render();
        assert_eq!(first, second);
        assert_eq!(first, source);
    }

    #[test]
    fn test_render_remote_untouched() {
        let source = "pip @ https://github.com/pypa/pip/archive/22.0.2.zip";
        assert_eq!(pin("/p/prod.in", source).render(), source);
    }
}
