//! Install target resolution
//!
//! Prefers the location where the host already has the application installed,
//! but only when that copy sits on the root volume and is not in the trash.
//! A copy inside a mounted disk image or the trash would make "installing"
//! over it pointless, so the operator is asked for a folder instead.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use super::InstallError;
use crate::config::BundleConfig;
use crate::host::{BundleLookup, Operator};
use crate::logging::{log_info, log_install};

pub struct TargetResolver {
    root_volume: PathBuf,
    trash_dir: PathBuf,
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self::for_current_user()
    }
}

impl TargetResolver {
    pub fn new(root_volume: impl Into<PathBuf>, trash_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_volume: root_volume.into(),
            trash_dir: trash_dir.into(),
        }
    }

    /// Root filesystem `/` and `~/.Trash`
    pub fn for_current_user() -> Self {
        let trash = dirs::home_dir().unwrap_or_default().join(".Trash");
        Self::new("/", trash)
    }

    /// Whether `path` lives on the same device as the root volume.
    /// Paths that cannot be stat-ed are treated as elsewhere.
    pub fn is_on_root_volume(&self, path: &Path) -> bool {
        let Ok(root) = fs::metadata(&self.root_volume) else {
            return false;
        };
        match fs::metadata(path) {
            Ok(meta) => meta.dev() == root.dev(),
            Err(_) => false,
        }
    }

    pub fn is_in_trash(&self, path: &Path) -> bool {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        absolute.starts_with(&self.trash_dir)
    }

    /// Whether an existing install may be overwritten in place
    pub fn is_acceptable(&self, path: &Path) -> bool {
        self.is_on_root_volume(path) && !self.is_in_trash(path)
    }

    pub fn resolve(
        &self,
        bundle: &BundleConfig,
        lookup: &dyn BundleLookup,
        operator: &dyn Operator,
    ) -> Result<PathBuf, InstallError> {
        match lookup.locate(&bundle.bundle_id) {
            Some(existing) if self.is_acceptable(&existing) => {
                log_install(&format!("Installing over existing copy at {:?}", existing));
                return Ok(existing);
            }
            Some(existing) => {
                log_info(&format!(
                    "Existing copy at {:?} is off the root volume or in the trash, asking for a location",
                    existing
                ));
            }
            None => log_info(&format!("{} is not installed, asking for a location", bundle.bundle_id)),
        }

        let prompt = format!("Where would you like to save the {} app?", bundle.app_name);
        let folder = operator
            .choose_folder(&prompt, &bundle.default_location)
            .ok_or(InstallError::Cancelled)?;

        Ok(folder.join(&bundle.bundle_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::test_support::{FixedLookup, ScriptedOperator};

    #[test]
    fn test_existing_copy_on_root_volume_is_used() {
        let home = tempfile::tempdir().unwrap();
        let app = home.path().join("Applications/Firefox.app");
        fs::create_dir_all(&app).unwrap();

        let resolver = TargetResolver::new(home.path(), home.path().join(".Trash"));
        let operator = ScriptedOperator::default();
        let target = resolver
            .resolve(&BundleConfig::default(), &FixedLookup(Some(app.clone())), &operator)
            .unwrap();

        assert_eq!(target, app);
        assert!(operator.folder_prompts().is_empty());
    }

    #[test]
    fn test_copy_on_other_volume_falls_back_to_folder_choice() {
        let home = tempfile::tempdir().unwrap();
        let app = home.path().join("Firefox.app");
        fs::create_dir_all(&app).unwrap();
        let chosen = home.path().join("chosen");

        // procfs is never on the same device as a scratch directory
        let resolver = TargetResolver::new("/proc", home.path().join(".Trash"));
        assert!(!resolver.is_on_root_volume(&app));

        let operator = ScriptedOperator::default().with_folder(chosen.clone());
        let target = resolver
            .resolve(&BundleConfig::default(), &FixedLookup(Some(app)), &operator)
            .unwrap();

        assert_eq!(target, chosen.join("Firefox.app"));
        assert_eq!(
            operator.folder_prompts(),
            vec![(
                "Where would you like to save the Firefox Dynasty app?".to_string(),
                PathBuf::from("/Applications")
            )]
        );
    }

    #[test]
    fn test_copy_in_trash_falls_back() {
        let home = tempfile::tempdir().unwrap();
        let trash = home.path().join(".Trash");
        let app = trash.join("Firefox.app");
        fs::create_dir_all(&app).unwrap();

        let resolver = TargetResolver::new(home.path(), &trash);
        assert!(resolver.is_on_root_volume(&app));
        assert!(resolver.is_in_trash(&app));

        let operator = ScriptedOperator::default().with_folder(home.path().to_path_buf());
        let target = resolver
            .resolve(&BundleConfig::default(), &FixedLookup(Some(app)), &operator)
            .unwrap();
        assert_eq!(target, home.path().join("Firefox.app"));
    }

    #[test]
    fn test_trash_match_is_per_component() {
        let resolver = TargetResolver::new("/", "/Users/me/.Trash");
        assert!(!resolver.is_in_trash(Path::new("/Users/me/.Trashcan/Firefox.app")));
        assert!(resolver.is_in_trash(Path::new("/Users/me/.Trash/Firefox.app")));
    }

    #[test]
    fn test_missing_install_and_cancelled_choice() {
        let resolver = TargetResolver::new("/", "/nonexistent/.Trash");
        let operator = ScriptedOperator::default();
        let err = resolver
            .resolve(&BundleConfig::default(), &FixedLookup(None), &operator)
            .unwrap_err();
        assert!(matches!(err, InstallError::Cancelled));
        assert_eq!(operator.folder_prompts().len(), 1);
    }

    #[test]
    fn test_vanished_path_is_not_on_root_volume() {
        let resolver = TargetResolver::new("/", "/nonexistent/.Trash");
        assert!(!resolver.is_on_root_volume(Path::new("/nonexistent/Firefox.app")));
    }
}
