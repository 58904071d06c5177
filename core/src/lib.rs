pub mod version;

pub use version::{Operator, PreRelease, Specifier, Version, VersionError};
