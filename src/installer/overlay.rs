//! Copies the fixed local file set into the staging tree

use std::path::Path;

use super::common::{copy_file, copy_tree};
use super::InstallError;
use crate::config::OverlayEntry;
use crate::logging::log_install;

/// Copy every overlay entry, in order, from `install_root` into `content_root`.
///
/// Overlay content always wins over whatever the archive put at the same path.
/// Directory sources are merged into the destination directory.
pub fn apply_overlay(
    entries: &[OverlayEntry],
    install_root: &Path,
    content_root: &Path,
) -> Result<(), InstallError> {
    for entry in entries {
        let source = install_root.join(&entry.source);
        let destination = content_root.join(&entry.destination);

        let result = if source.is_dir() {
            copy_tree(&source, &destination)
        } else {
            copy_file(&source, &destination)
        };

        result.map_err(|e| InstallError::Overlay {
            source: source.display().to_string(),
            reason: e.to_string(),
        })?;

        log_install(&format!("Overlay: {:?} -> {:?}", entry.source, entry.destination));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_overlay_replaces_archive_content() {
        let root = tempfile::tempdir().unwrap();
        let content = tempfile::tempdir().unwrap();

        fs::write(root.path().join("firefox.cfg"), "overlay cfg").unwrap();
        fs::create_dir_all(root.path().join("defaults/pref")).unwrap();
        fs::write(root.path().join("defaults/pref/local.js"), "overlay pref").unwrap();

        fs::create_dir_all(content.path().join("Resources/defaults/pref")).unwrap();
        fs::write(content.path().join("Resources/firefox.cfg"), "archive cfg").unwrap();
        fs::write(content.path().join("Resources/defaults/pref/local.js"), "archive pref").unwrap();
        fs::write(content.path().join("Resources/defaults/pref/channel.js"), "channel").unwrap();

        let entries = vec![
            OverlayEntry::new("defaults", "Resources/defaults"),
            OverlayEntry::new("firefox.cfg", "Resources/firefox.cfg"),
        ];
        apply_overlay(&entries, root.path(), content.path()).unwrap();

        assert_eq!(
            fs::read_to_string(content.path().join("Resources/firefox.cfg")).unwrap(),
            "overlay cfg"
        );
        assert_eq!(
            fs::read_to_string(content.path().join("Resources/defaults/pref/local.js")).unwrap(),
            "overlay pref"
        );
        // Archive files at other paths survive
        assert!(content.path().join("Resources/defaults/pref/channel.js").exists());
    }

    #[test]
    fn test_overlay_creates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let content = tempfile::tempdir().unwrap();
        fs::write(root.path().join("Lib.dylib"), "lib").unwrap();

        let entries = vec![OverlayEntry::new("Lib.dylib", "Frameworks/Lib.dylib")];
        apply_overlay(&entries, root.path(), content.path()).unwrap();

        assert_eq!(fs::read(content.path().join("Frameworks/Lib.dylib")).unwrap(), b"lib");
    }

    #[test]
    fn test_missing_overlay_source_fails() {
        let root = tempfile::tempdir().unwrap();
        let content = tempfile::tempdir().unwrap();

        let entries = vec![OverlayEntry::new("missing.icns", "Resources/missing.icns")];
        let err = apply_overlay(&entries, root.path(), content.path()).unwrap_err();
        assert!(matches!(err, InstallError::Overlay { .. }));
    }
}
