use std::{path::PathBuf, sync::LazyLock};

pub static DEFAULT_DATA_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Ok(custom) = std::env::var("DYNASTY_INSTALLER_HOME") {
        if !custom.is_empty() {
            return PathBuf::from(custom);
        }
    }

    let mut path = dirs::home_dir().unwrap_or_default();
    path.push(".dynasty-installer");
    path
});

/// Computes a path inside the installer's data directory.
///
/// Returns a `&Path` referencing the data directory itself if no arguments are passed in, or a
/// `PathBuf` created by joining all of the arguments to the data directory if at least one
/// argument is passed in.
///
/// # Examples
///
/// ```
/// // Assuming `DYNASTY_INSTALLER_HOME` is not set, the data directory is ~/.dynasty-installer
/// use dynasty_installer::data_path;
/// assert!(data_path!("logs").ends_with("logs"));
/// assert!(data_path!("a", "b").ends_with("a/b"));
/// ```
#[macro_export]
macro_rules! data_path {
    () => {
        $crate::paths::DEFAULT_DATA_PATH.as_path()
    };

    ( $( $path:expr ),+ $(,)? ) => {
        [
            $crate::paths::DEFAULT_DATA_PATH.as_path(),
            $( std::path::Path::new(&$path) ),+
        ].into_iter().collect::<std::path::PathBuf>()
    };
}
