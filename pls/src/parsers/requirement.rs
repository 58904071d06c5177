use lock_sync_core::Specifier;
use tracing::debug;

/// Kind of nested file reference a requirement file can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `-r`: pulls the referenced file's packages into this file's own set
    Requirement,
    /// `-c`: restricts versions without adding new packages
    Constraint,
}

/// One parsed requirement line
#[derive(Debug, Clone)]
pub struct ReqLine {
    /// Package name, normalized
    pub name: String,
    pub specifiers: Vec<Specifier>,
    /// Environment markers after `;`, without the separators
    pub qualifiers: Vec<String>,
    /// `pkg @ url` reference, passed through untouched
    pub remote: bool,
    /// Requirement text with comments stripped
    pub raw: String,
}

#[derive(Debug, Clone)]
pub enum ParsedLine {
    /// Comment, blank line, or pip option we do not track
    Skip,
    /// `-r`/`-c` include directive with the referenced relative path
    Include { kind: IncludeKind, path: String },
    Requirement(ReqLine),
}

/// Normalize a package name to lowercase with underscores folded to hyphens
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

/// Strip an inline comment to the right of a requirement
fn strip_inline_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => line[..pos].trim_end(),
        None => line,
    }
}

/// Path operand of an include directive, accepting `-r path`,
/// `--requirement path` and `--requirement=path` spellings.
/// The flag must be followed by a separator so `--retries` never matches `-r`.
fn include_path<'a>(line: &'a str, short: &str, long: &str) -> Option<&'a str> {
    let rest = if let Some(rest) = line.strip_prefix(long) {
        match rest.chars().next() {
            Some('=') => &rest[1..],
            Some(c) if c.is_whitespace() => rest,
            _ => return None,
        }
    } else if let Some(rest) = line.strip_prefix(short) {
        match rest.chars().next() {
            Some(c) if c.is_whitespace() => rest,
            _ => return None,
        }
    } else {
        return None;
    };
    let path = strip_inline_comment(rest).trim();
    if path.is_empty() { None } else { Some(path) }
}

/// Parse a single line from a requirement file
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();

    if line.is_empty() || line.starts_with('#') {
        return ParsedLine::Skip;
    }

    if let Some(path) = include_path(line, "-r", "--requirement") {
        return ParsedLine::Include {
            kind: IncludeKind::Requirement,
            path: path.to_string(),
        };
    }
    if let Some(path) = include_path(line, "-c", "--constraint") {
        return ParsedLine::Include {
            kind: IncludeKind::Constraint,
            path: path.to_string(),
        };
    }

    // Other pip options (--index-url, -e, ...) are not tracked
    if line.starts_with('-') {
        return ParsedLine::Skip;
    }

    let line = strip_inline_comment(line);
    if line.is_empty() {
        return ParsedLine::Skip;
    }
    let raw = line.to_string();

    // `pkg @ https://...` passes through with only the name extracted
    let head = line.split(';').next().unwrap_or(line);
    if let Some((name_part, _)) = head.split_once('@') {
        if !name_part.contains(['<', '>', '=', '!', '~']) {
            return ParsedLine::Requirement(ReqLine {
                name: normalize_name(strip_extras(name_part)),
                specifiers: Vec::new(),
                qualifiers: Vec::new(),
                remote: true,
                raw,
            });
        }
    }

    // Environment markers after the first semicolon
    let (req_part, qualifiers) = match line.find(';') {
        Some(pos) => {
            let qualifiers = line[pos + 1..]
                .split(';')
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(String::from)
                .collect();
            (line[..pos].trim_end(), qualifiers)
        }
        None => (line, Vec::new()),
    };

    let (name_with_extras, spec_str) = split_name_specifiers(req_part);
    let name = normalize_name(strip_extras(name_with_extras));
    if name.is_empty() {
        return ParsedLine::Skip;
    }

    let specifiers = match Specifier::parse_many(spec_str) {
        Ok(specifiers) => specifiers,
        Err(err) => {
            debug!(%err, line = %raw, "dropping unparsable specifier");
            Vec::new()
        }
    };

    ParsedLine::Requirement(ReqLine {
        name,
        specifiers,
        qualifiers,
        remote: false,
        raw,
    })
}

/// Remove an extras suffix: `coverage[toml]` becomes `coverage`
fn strip_extras(name: &str) -> &str {
    match name.find('[') {
        Some(pos) => name[..pos].trim(),
        None => name.trim(),
    }
}

/// Split a requirement into name (with extras) and specifier text.
/// The first operator outside brackets starts the specifiers.
fn split_name_specifiers(spec: &str) -> (&str, &str) {
    let operators = ["==", ">=", "<=", "~=", "!=", ">", "<"];

    let mut first_op_idx: Option<usize> = None;
    for op in operators {
        if let Some(idx) = spec.find(op) {
            let before = &spec[..idx];
            let open_brackets = before.matches('[').count();
            let close_brackets = before.matches(']').count();
            if open_brackets == close_brackets {
                first_op_idx = Some(first_op_idx.map_or(idx, |prev| prev.min(idx)));
            }
        }
    }

    match first_op_idx {
        Some(idx) => (spec[..idx].trim(), spec[idx..].trim()),
        None => (spec.trim(), ""),
    }
}
