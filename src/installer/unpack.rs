//! Archive unpacking into a private staging directory

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use super::InstallError;
use crate::logging::{log_install, log_warning};

/// Owner execute bit (`S_IXUSR`)
const OWNER_EXEC: u32 = 0o100;

/// Temporary directory holding the unpacked bundle content.
///
/// Removed from disk when dropped.
pub struct StagingTree {
    dir: TempDir,
    content_root: PathBuf,
}

impl StagingTree {
    /// The temporary directory itself
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The bundle content directory inside the staging tree (e.g. `<tmp>/Contents`)
    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Delete the staging tree, reporting errors instead of ignoring them
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// Drop the first path segment of an archive entry name.
/// `Firefox.app/Contents/MacOS/firefox` becomes `Contents/MacOS/firefox`.
fn strip_first_segment(name: &str) -> Option<&str> {
    name.split_once('/').map(|(_, rest)| rest)
}

/// A stripped entry path may only name things below the staging directory
fn stays_inside(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Unpack every entry of `archive` that lives under `prefix` into a fresh
/// staging directory, with the first path segment removed.
///
/// Entries outside the prefix are skipped. Files whose stored Unix mode has
/// the owner execute bit get that bit set on disk.
pub fn unpack_archive(archive: &Path, prefix: &str) -> Result<StagingTree, InstallError> {
    let dir = tempfile::Builder::new()
        .prefix("dynasty-staging")
        .tempdir()?;

    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    let mut unpacked = 0usize;
    let mut executables = 0usize;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();

        if !name.starts_with(prefix) {
            continue;
        }

        let Some(relative) = strip_first_segment(&name).filter(|r| !r.is_empty()) else {
            continue;
        };
        // Checked after stripping: `A/B/../../x` is enclosed as a whole but not once `A/` is gone
        if entry.enclosed_name().is_none() || !stays_inside(relative) {
            log_warning(&format!("Skipping unsafe archive entry: {}", name));
            continue;
        }
        let target = dir.path().join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            drop(out);

            if entry.unix_mode().is_some_and(|mode| mode & OWNER_EXEC != 0) {
                let mut perms = fs::metadata(&target)?.permissions();
                perms.set_mode(perms.mode() | OWNER_EXEC);
                fs::set_permissions(&target, perms)?;
                executables += 1;
            }
        }
        unpacked += 1;
    }

    if unpacked == 0 {
        return Err(InstallError::Archive {
            reason: format!("no entries under '{}'", prefix),
        });
    }

    let content_root = match strip_first_segment(prefix.trim_end_matches('/')) {
        Some(rest) => dir.path().join(rest),
        None => dir.path().to_path_buf(),
    };
    fs::create_dir_all(&content_root)?;

    log_install(&format!(
        "Unpacked {} entries ({} executable) into {:?}",
        unpacked, executables, content_root
    ));

    Ok(StagingTree { dir, content_root })
}
