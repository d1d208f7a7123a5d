//! Filesystem helpers.

pub mod paths;
pub mod temp_folder;

pub use temp_folder::{DirectoryCloseMode, TemporaryFolder};
