//! Infrastructure layer for filesystem and environment interactions.
//!
//! Resolves where runtime data lives and how configured image locations turn
//! into file paths.

pub mod paths;

pub use paths::{get_data_dir, image_path};
