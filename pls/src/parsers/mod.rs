pub mod requirement;

pub use requirement::{IncludeKind, ParsedLine, ReqLine, normalize_name, parse_line};
