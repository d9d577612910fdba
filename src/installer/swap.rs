//! Replaces the target bundle's content with the staged content
//!
//! There is no backup and no rollback: a failure after the old content is
//! removed leaves the bundle empty.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use super::common::{copy_tree, set_mode_recursive, touch};
use super::InstallError;
use crate::logging::{log_install, log_warning};

/// rwxr-xr-x applied to the whole bundle after the copy
pub const BUNDLE_MODE: u32 = 0o755;

/// Replace `<target>/<content_dir>` with `staged_content`.
///
/// `settle_delay` runs between the copy and the permission pass; slow volumes
/// need it before the freshly copied tree can be re-moded.
pub fn swap_into(
    staged_content: &Path,
    target: &Path,
    content_dir: &Path,
    settle_delay: Duration,
) -> Result<(), InstallError> {
    let target_content = target.join(content_dir);

    match fs::remove_dir_all(&target_content) {
        Ok(()) => log_install(&format!("Removed old content at {:?}", target_content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log_warning(&format!(
            "Could not fully remove {:?}: {}",
            target_content, e
        )),
    }

    copy_tree(staged_content, &target_content)?;
    log_install(&format!("Copied new content to {:?}", target_content));

    if !settle_delay.is_zero() {
        std::thread::sleep(settle_delay);
    }

    set_mode_recursive(target, BUNDLE_MODE)?;
    // Finder and Launch Services key their caches on the bundle's mtime
    touch(target)?;

    Ok(())
}
