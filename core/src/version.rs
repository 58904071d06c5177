use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VersionError {
    #[error("Invalid version string: {0}")]
    InvalidVersion(String),
    #[error("Invalid version specifier: {0}")]
    InvalidSpecifier(String),
}

/// Pre-release phase. Ordering follows PEP 440: alpha < beta < rc
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

/// A parsed PEP 440 version
///
/// Ordering covers the public version: epoch, release segments, then
/// pre/post/dev. The local segment (`+...`) is carried but never compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    pub pre: Option<(PreRelease, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<String>,
    /// Original string representation
    pub original: String,
}

impl Version {
    pub fn new(release: &[u64]) -> Self {
        let original = release
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        Self {
            epoch: 0,
            release: release.to_vec(),
            pre: None,
            post: None,
            dev: None,
            local: None,
            original,
        }
    }

    /// Check if this is a pre-release or dev version
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// Release segment at `idx`, missing segments read as zero
    fn segment(&self, idx: usize) -> u64 {
        self.release.get(idx).copied().unwrap_or(0)
    }

    /// Collapse pre/post/dev presence into a totally ordered key.
    ///
    /// A dev release without pre/post markers sorts before any pre-release
    /// of the same release segments, which sorts before the final release.
    fn phase_key(&self) -> (u8, u8, u64) {
        match &self.pre {
            Some((phase, n)) => (1, *phase as u8, *n),
            None if self.post.is_none() && self.dev.is_some() => (0, 0, 0),
            None => (2, 0, 0),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        let segments = self.release.len().max(other.release.len());
        for idx in 0..segments {
            match self.segment(idx).cmp(&other.segment(idx)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match self.phase_key().cmp(&other.phase_key()) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Post-releases sort after the plain release: None < Some
        match self.post.cmp(&other.post) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // A release without a dev marker sorts after its dev precursors
        match (&self.dev, &other.dev) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let original = s.trim().to_string();
        if original.is_empty() {
            return Err(VersionError::InvalidVersion(original));
        }
        let lower = original.to_ascii_lowercase();
        let body = lower.strip_prefix('v').unwrap_or(&lower);

        // Local version separator (+)
        let (body, local) = match body.split_once('+') {
            Some((head, tail)) => (head, Some(tail.to_string())),
            None => (body, None),
        };

        // Epoch separator (!)
        let (epoch, body) = match body.split_once('!') {
            Some((head, tail)) => {
                let epoch = head
                    .parse()
                    .map_err(|_| VersionError::InvalidVersion(original.clone()))?;
                (epoch, tail)
            }
            None => (0, body),
        };

        let (release, rest) = parse_release(body, &original)?;
        let (pre, post, dev) = parse_phases(rest, &original)?;

        Ok(Version {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
            original,
        })
    }
}

/// Leading dotted numeric segments, e.g. `1.24.0` of `1.24.0rc1`
fn parse_release<'a>(body: &'a str, original: &str) -> Result<(Vec<u64>, &'a str), VersionError> {
    let mut release = Vec::new();
    let mut rest = body;
    loop {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            break;
        }
        let value = rest[..digits]
            .parse()
            .map_err(|_| VersionError::InvalidVersion(original.to_string()))?;
        release.push(value);
        rest = &rest[digits..];

        match rest.strip_prefix('.') {
            Some(tail) if tail.starts_with(|c: char| c.is_ascii_digit()) => rest = tail,
            _ => break,
        }
    }

    if release.is_empty() {
        return Err(VersionError::InvalidVersion(original.to_string()));
    }

    Ok((release, rest))
}

type Phases = (Option<(PreRelease, u64)>, Option<u64>, Option<u64>);

/// Pre/post/dev markers after the release segments, in any PEP 440 spelling
fn parse_phases(rest: &str, original: &str) -> Result<Phases, VersionError> {
    let mut pre = None;
    let mut post = None;
    let mut dev = None;

    // Longer spellings first so e.g. "rc" is never read as post-marker "r"
    let tags: [(&str, Tag); 12] = [
        ("dev", Tag::Dev),
        ("alpha", Tag::Pre(PreRelease::Alpha)),
        ("beta", Tag::Pre(PreRelease::Beta)),
        ("preview", Tag::Pre(PreRelease::Rc)),
        ("pre", Tag::Pre(PreRelease::Rc)),
        ("post", Tag::Post),
        ("rev", Tag::Post),
        ("rc", Tag::Pre(PreRelease::Rc)),
        ("a", Tag::Pre(PreRelease::Alpha)),
        ("b", Tag::Pre(PreRelease::Beta)),
        ("c", Tag::Pre(PreRelease::Rc)),
        ("r", Tag::Post),
    ];

    let mut cursor = rest;
    while !cursor.is_empty() {
        cursor = cursor.trim_start_matches(['.', '-', '_']);
        if cursor.is_empty() {
            break;
        }

        if cursor.starts_with(|c: char| c.is_ascii_digit()) {
            // Implicit post-release, e.g. 1.0-1
            let (number, tail) = take_number(cursor);
            post = Some(number);
            cursor = tail;
            continue;
        }

        let Some((tag, tail)) = tags
            .iter()
            .find_map(|(spelling, tag)| cursor.strip_prefix(spelling).map(|t| (*tag, t)))
        else {
            return Err(VersionError::InvalidVersion(original.to_string()));
        };

        let (number, tail) = take_number(tail);
        match tag {
            Tag::Dev => dev = Some(number),
            Tag::Post => post = Some(number),
            Tag::Pre(phase) => pre = Some((phase, number)),
        }
        cursor = tail;
    }

    Ok((pre, post, dev))
}

#[derive(Clone, Copy)]
enum Tag {
    Dev,
    Post,
    Pre(PreRelease),
}

/// Optional separator then digits; a bare marker reads as zero, e.g. `1.0rc`
fn take_number(s: &str) -> (u64, &str) {
    let s = s.trim_start_matches(['.', '-', '_']);
    let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digits == 0 {
        (0, s)
    } else {
        (s[..digits].parse().unwrap_or(0), &s[digits..])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Version constraint operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// ==
    Eq,
    /// !=
    NotEq,
    /// <=
    LessEq,
    /// >=
    GreaterEq,
    /// <
    Less,
    /// >
    Greater,
    /// ~=
    Compatible,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::LessEq => "<=",
            Operator::GreaterEq => ">=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::Compatible => "~=",
        }
    }

    /// `>=` or `>`
    pub fn is_lower_bound(self) -> bool {
        matches!(self, Operator::GreaterEq | Operator::Greater)
    }

    /// `<=` or `<`
    pub fn is_upper_bound(self) -> bool {
        matches!(self, Operator::LessEq | Operator::Less)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One version constraint, operator plus version, e.g. `>=24.2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    pub op: Operator,
    pub version: Version,
}

impl Specifier {
    pub fn new(op: Operator, version: Version) -> Self {
        Self { op, version }
    }

    /// Parse a single specifier, e.g. `==1.2.3`
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        // Two-character operators first
        let operators = [
            ("==", Operator::Eq),
            ("!=", Operator::NotEq),
            ("<=", Operator::LessEq),
            (">=", Operator::GreaterEq),
            ("~=", Operator::Compatible),
            ("<", Operator::Less),
            (">", Operator::Greater),
        ];
        for (token, op) in operators {
            if let Some(version_str) = s.strip_prefix(token) {
                let version = Version::from_str(version_str.trim())?;
                return Ok(Self { op, version });
            }
        }

        Err(VersionError::InvalidSpecifier(s.to_string()))
    }

    /// Parse a comma-separated specifier list, e.g. `>=1.0,<2.0`
    pub fn parse_many(s: &str) -> Result<Vec<Self>, VersionError> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Check if a version satisfies this constraint
    pub fn contains(&self, version: &Version) -> bool {
        match self.op {
            Operator::Eq => version == &self.version,
            Operator::NotEq => version != &self.version,
            Operator::LessEq => version <= &self.version,
            Operator::GreaterEq => version >= &self.version,
            Operator::Less => version < &self.version,
            Operator::Greater => version > &self.version,
            Operator::Compatible => {
                // ~=X.Y means >=X.Y with the same X; ~=X.Y.Z the same X.Y
                if version < &self.version {
                    return false;
                }
                let prefix = self.version.release.len().saturating_sub(1).max(1);
                (0..prefix).all(|idx| version.segment(idx) == self.version.segment(idx))
            }
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_version() {
        let parsed = v("1.24.3");
        assert_eq!(parsed.release, vec![1, 24, 3]);
        assert_eq!(parsed.epoch, 0);
        assert!(parsed.pre.is_none());

        let parsed = v("2.0");
        assert_eq!(parsed.release, vec![2, 0]);
    }

    #[test]
    fn test_parse_epoch_and_local() {
        let parsed = v("1!2.0+ubuntu1");
        assert_eq!(parsed.epoch, 1);
        assert_eq!(parsed.release, vec![2, 0]);
        assert_eq!(parsed.local.as_deref(), Some("ubuntu1"));
    }

    #[test]
    fn test_parse_phase_spellings() {
        assert_eq!(v("1.0a1").pre, Some((PreRelease::Alpha, 1)));
        assert_eq!(v("1.0.alpha.1").pre, Some((PreRelease::Alpha, 1)));
        assert_eq!(v("1.0b2").pre, Some((PreRelease::Beta, 2)));
        assert_eq!(v("1.0rc4").pre, Some((PreRelease::Rc, 4)));
        assert_eq!(v("1.0pre4").pre, Some((PreRelease::Rc, 4)));
        assert_eq!(v("1.0.post2").post, Some(2));
        assert_eq!(v("1.0-3").post, Some(3));
        assert_eq!(v("1.0.dev5").dev, Some(5));
        assert_eq!(v("1.0rc").pre, Some((PreRelease::Rc, 0)));
    }

    #[test]
    fn test_invalid_version() {
        assert!(Version::from_str("").is_err());
        assert!(Version::from_str("abc").is_err());
        assert!(Version::from_str("1.0.whatisthis").is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.2.4") < v("2.0.0"));
        assert!(v("1.2") == v("1.2.0"));
        assert!(v("0!2.0") < v("1!1.0"));
    }

    #[test]
    fn test_phase_ordering() {
        // PEP 440 example chain
        assert!(v("1.0.dev1") < v("1.0a1"));
        assert!(v("1.0a1") < v("1.0a2"));
        assert!(v("1.0a2") < v("1.0b1"));
        assert!(v("1.0b1") < v("1.0rc1"));
        assert!(v("1.0rc1") < v("1.0"));
        assert!(v("1.0") < v("1.0.post1"));
        assert!(v("1.0.post1") < v("1.1.dev1"));
        assert!(v("1.0a1.dev1") < v("1.0a1"));
        assert!(v("1.0.post1.dev1") < v("1.0.post1"));
    }

    #[test]
    fn test_local_ignored_in_ordering() {
        assert!(v("1.0+local1") == v("1.0+local2"));
        assert!(v("1.0+local") == v("1.0"));
    }

    #[test]
    fn test_parse_specifier() {
        let spec = Specifier::parse("==1.2.3").unwrap();
        assert_eq!(spec.op, Operator::Eq);
        assert_eq!(spec.version, v("1.2.3"));

        let spec = Specifier::parse(">= 24.2").unwrap();
        assert_eq!(spec.op, Operator::GreaterEq);

        assert!(Specifier::parse("1.2.3").is_err());
        assert!(Specifier::parse("").is_err());
    }

    #[test]
    fn test_parse_many() {
        let specs = Specifier::parse_many(">=23.0,<25.3,!=25.2").unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[1].op, Operator::Less);
    }

    #[test]
    fn test_contains() {
        assert!(Specifier::parse(">=1.0").unwrap().contains(&v("1.5")));
        assert!(!Specifier::parse(">=1.0").unwrap().contains(&v("0.9")));
        assert!(Specifier::parse("!=1.0").unwrap().contains(&v("1.1")));
        assert!(!Specifier::parse("!=1.0").unwrap().contains(&v("1.0")));
        assert!(Specifier::parse("<2.0").unwrap().contains(&v("1.9.9")));
        assert!(!Specifier::parse("<2.0").unwrap().contains(&v("2.0")));
    }

    #[test]
    fn test_contains_compatible() {
        let spec = Specifier::parse("~=2.2").unwrap();
        assert!(spec.contains(&v("2.2")));
        assert!(spec.contains(&v("2.9")));
        assert!(!spec.contains(&v("3.0")));
        assert!(!spec.contains(&v("2.1")));

        let spec = Specifier::parse("~=2.2.1").unwrap();
        assert!(spec.contains(&v("2.2.5")));
        assert!(!spec.contains(&v("2.3.0")));
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(Operator::GreaterEq.to_string(), ">=");
        assert_eq!(Specifier::parse("!=25.3").unwrap().to_string(), "!=25.3");
    }
}
