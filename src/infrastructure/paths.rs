//! Path helpers for image storage and runtime data.

use std::path::PathBuf;

/// Environment variable overriding the runtime data directory.
pub const DATA_DIR_ENV: &str = "ARCANVAS_DATA_DIR";

/// Returns the directory used for trace output and other runtime data.
///
/// Resolution order:
/// 1. `$ARCANVAS_DATA_DIR`
/// 2. `$HOME/.local/share/arcanvas`
/// 3. `./.arcanvas` when no home directory is known
///
/// # Examples
///
/// ```
/// use arcanvas::infrastructure::get_data_dir;
///
/// let dir = get_data_dir();
/// assert!(!dir.as_os_str().is_empty());
/// ```
#[must_use]
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    std::env::var_os("HOME").map_or_else(
        || PathBuf::from(".arcanvas"),
        |home| PathBuf::from(home).join(".local").join("share").join("arcanvas"),
    )
}

/// Builds an image path by plain concatenation of directory and file name.
///
/// The configured directory is expected to carry its trailing separator, the
/// way device photo folders are usually written. No normalisation happens, so
/// a directory without one yields a sibling file name.
///
/// # Examples
///
/// ```
/// use arcanvas::infrastructure::image_path;
///
/// assert_eq!(
///     image_path("/storage/self/primary/DCIM/photos/", "example.jpg").to_str(),
///     Some("/storage/self/primary/DCIM/photos/example.jpg")
/// );
/// ```
#[must_use]
pub fn image_path(directory: &str, file: &str) -> PathBuf {
    PathBuf::from(format!("{directory}{file}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_is_literal() {
        assert_eq!(image_path("/photos", "a.jpg"), PathBuf::from("/photosa.jpg"));
        assert_eq!(image_path("/photos/", "a.jpg"), PathBuf::from("/photos/a.jpg"));
    }
}
