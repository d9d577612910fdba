//! Common installer utilities shared between the pipeline stages

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::SystemTime;

use walkdir::WalkDir;

// ============================================================================
// Shared Installation Errors
// ============================================================================

/// Custom error type for installation operations
#[derive(Debug)]
pub enum InstallError {
    /// Operator dismissed a dialog without choosing
    Cancelled,
    /// The release feed's host did not answer the probe
    Connectivity { host: String, reason: String },
    /// The release list could not be fetched or parsed
    Feed { reason: String },
    /// The feed returned no releases
    NoReleases,
    /// A preselected tag is not among the fetched releases
    UnknownRelease { tag: String },
    /// The selected release has no downloadable asset
    NoAssets { tag: String },
    /// Network transfer failed
    Download { reason: String },
    /// The archive could not be read or unpacked
    Archive { reason: String },
    /// An overlay file could not be copied into the staging tree
    Overlay { source: String, reason: String },
    /// The patcher or signer failed and the policy is to abort
    ToolFailed { tool: String, failures: usize },
    /// Filesystem error
    Io(io::Error),
    /// Generic error with context
    Other { context: String, reason: String },
}

impl std::fmt::Display for InstallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallError::Cancelled => write!(f, "Installation cancelled by user"),
            InstallError::Connectivity { host, reason } => {
                write!(f, "Could not connect to {}: {}", host, reason)
            }
            InstallError::Feed { reason } => {
                write!(f, "Failed to retrieve releases: {}", reason)
            }
            InstallError::NoReleases => write!(f, "The release feed returned no releases"),
            InstallError::UnknownRelease { tag } => {
                write!(f, "Release '{}' was not found in the release feed", tag)
            }
            InstallError::NoAssets { tag } => {
                write!(f, "Release '{}' has no downloadable assets", tag)
            }
            InstallError::Download { reason } => write!(f, "Download failed: {}", reason),
            InstallError::Archive { reason } => write!(f, "Failed to unpack archive: {}", reason),
            InstallError::Overlay { source, reason } => {
                write!(f, "Failed to copy overlay '{}': {}", source, reason)
            }
            InstallError::ToolFailed { tool, failures } => {
                write!(f, "{} failed on {} file(s)", tool, failures)
            }
            InstallError::Io(e) => write!(f, "I/O error: {}", e),
            InstallError::Other { context, reason } => {
                write!(f, "{}: {}", context, reason)
            }
        }
    }
}

impl std::error::Error for InstallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InstallError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for InstallError {
    fn from(e: io::Error) -> Self {
        InstallError::Io(e)
    }
}

impl From<zip::result::ZipError> for InstallError {
    fn from(e: zip::result::ZipError) -> Self {
        InstallError::Archive {
            reason: e.to_string(),
        }
    }
}

impl From<ureq::Error> for InstallError {
    fn from(e: ureq::Error) -> Self {
        InstallError::Download {
            reason: e.to_string(),
        }
    }
}

// ============================================================================
// Filesystem Helpers
// ============================================================================

/// Copy a directory tree into `dst`, overwriting files that already exist.
///
/// File permissions travel with the copy. Symlinks are recreated, not followed.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            if fs::symlink_metadata(&target).is_ok() {
                fs::remove_file(&target)?;
            }
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Copy a single file, creating parent directories and replacing whatever was there
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Ok(meta) = fs::symlink_metadata(dst) {
        if meta.is_dir() {
            fs::remove_dir_all(dst)?;
        } else if meta.file_type().is_symlink() {
            fs::remove_file(dst)?;
        }
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// `chmod -R <mode>` over a tree. Symlinks are left alone.
pub fn set_mode_recursive(root: &Path, mode: u32) -> io::Result<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_symlink() {
            continue;
        }
        fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

/// Bump the modification time of a file or directory to now
pub fn touch(path: &Path) -> io::Result<()> {
    let file = fs::File::open(path)?;
    file.set_modified(SystemTime::now())
}
