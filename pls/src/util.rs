use crate::error::LockError;
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const SUFFIX_IN: &str = ".in";
pub const SUFFIX_LOCK: &str = ".lock";
pub const SUFFIX_UNLOCK: &str = ".unlock";
pub const SUFFIX_SHARED: &str = ".shared";

const ENDINGS: [&str; 3] = [SUFFIX_IN, SUFFIX_LOCK, SUFFIX_UNLOCK];

/// Which form of a requirement file to operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqSuffix {
    /// Source file with unresolved references
    In,
    /// Compiled output with exact pins
    Lock,
    /// Resolved output with the declared constraints kept as-is
    Unlock,
}

impl ReqSuffix {
    pub fn as_str(self) -> &'static str {
        match self {
            ReqSuffix::In => SUFFIX_IN,
            ReqSuffix::Lock => SUFFIX_LOCK,
            ReqSuffix::Unlock => SUFFIX_UNLOCK,
        }
    }
}

impl fmt::Display for ReqSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File name without its `.in`/`.lock`/`.unlock` ending, if it has one
fn strip_ending(file_name: &str) -> &str {
    ENDINGS
        .iter()
        .find_map(|ending| file_name.strip_suffix(ending))
        .unwrap_or(file_name)
}

/// True when the suffix before the ending marks the file as shared across
/// venvs, e.g. `pins.shared.in`
pub fn is_shared(file_name: &str) -> bool {
    strip_ending(file_name).ends_with(SUFFIX_SHARED)
}

/// Replace the last suffix, preserving a `.shared` marker:
/// `prod.shared.in` + `.unlock` becomes `prod.shared.unlock`
pub fn replace_suffix_last(abspath: &Path, suffix_last: &str) -> Result<PathBuf, LockError> {
    if !abspath.is_absolute() {
        return Err(LockError::NotAbsolute(abspath.to_path_buf()));
    }
    let name = abspath
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LockError::UnsupportedSuffix(abspath.to_path_buf()))?;

    let stem = strip_ending(name);
    Ok(abspath.with_file_name(format!("{stem}{suffix_last}")))
}

/// The file's suffix class; anything but `.in`/`.lock`/`.unlock` is refused
pub fn check_suffix(abspath: &Path) -> Result<ReqSuffix, LockError> {
    let name = abspath
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LockError::UnsupportedSuffix(abspath.to_path_buf()))?;

    if name.ends_with(SUFFIX_IN) {
        Ok(ReqSuffix::In)
    } else if name.ends_with(SUFFIX_LOCK) {
        Ok(ReqSuffix::Lock)
    } else if name.ends_with(SUFFIX_UNLOCK) {
        Ok(ReqSuffix::Unlock)
    } else {
        Err(LockError::UnsupportedSuffix(abspath.to_path_buf()))
    }
}

/// Folder nesting depth of the file below `base`; files outside `base`
/// count their full parent chain
pub fn depth_below(abspath: &Path, base: &Path) -> usize {
    let parent = abspath.parent().unwrap_or(abspath);
    match parent.strip_prefix(base) {
        Ok(rel) => rel.components().count(),
        Err(_) => parent.components().count(),
    }
}

/// Lexically resolve `relative` against `anchor_dir`, collapsing `.` and
/// `..` without touching the filesystem. Reference targets may not exist
/// yet, so `canonicalize` is not an option.
pub fn lexical_join(anchor_dir: &Path, relative: &str) -> PathBuf {
    let mut out = anchor_dir.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) => {
                out = PathBuf::from(component.as_os_str());
            }
        }
    }
    out
}
