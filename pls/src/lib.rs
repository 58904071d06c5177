pub mod aggregate;
pub mod cli;
pub mod collection;
pub mod error;
pub mod file_unit;
pub mod fixes;
pub mod output;
pub mod parsers;
pub mod pin;
pub mod reconcile;
pub mod util;
pub mod venvs;

pub use aggregate::{VenvPins, unlock_compile};
pub use cli::Args;
pub use collection::ReqGraph;
pub use error::{LockError, ReconcileError};
pub use file_unit::ReqFile;
pub use fixes::Fixer;
pub use pin::Pin;
pub use util::ReqSuffix;
pub use venvs::VenvMap;
