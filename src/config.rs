use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::installer::InstallError;

// ============================================================================
// Main Installer Config
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct InstallerConfig {
    /// Directory holding the helper tools and overlay files.
    /// Resolved once at startup when not set.
    pub install_root: Option<PathBuf>,
    pub feed: FeedConfig,
    pub bundle: BundleConfig,
    pub tools: ToolsConfig,
    pub overlay: Vec<OverlayEntry>,
    pub install: InstallConfig,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            feed: FeedConfig::default(),
            bundle: BundleConfig::default(),
            tools: ToolsConfig::default(),
            overlay: default_overlay(),
            install: InstallConfig::default(),
        }
    }
}

impl InstallerConfig {
    fn get_path() -> PathBuf {
        crate::data_path!("config.json")
    }

    /// Load the config from the data directory, falling back to defaults
    pub fn load() -> Self {
        let path = Self::get_path();
        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = serde_json::from_str(&content) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Load a config from an explicit path. Unlike [`InstallerConfig::load`], a
    /// missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, InstallError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| InstallError::Other {
            context: format!("Config {}", path.display()),
            reason: e.to_string(),
        })
    }

    /// Save the config to the data directory, returning where it was written
    pub fn save(&self) -> Result<PathBuf, InstallError> {
        let path = Self::get_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), InstallError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| InstallError::Other {
            context: "Serializing config".to_string(),
            reason: e.to_string(),
        })?;
        fs::write(path, json)?;
        Ok(())
    }

    /// The installation root, or the directory of the running executable
    pub fn resolve_install_root(&self) -> PathBuf {
        if let Some(root) = &self.install_root {
            return root.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

// ============================================================================
// Release Feed
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct FeedConfig {
    pub owner: String,
    pub repo: String,
    pub api_base: String,
    pub probe_url: String,
    pub release_limit: usize,
    pub user_agent: String,
    /// Skips TLS certificate and host name verification. Legacy systems ship
    /// trust stores that can no longer validate the feed's certificates.
    pub accept_invalid_certs: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            owner: "i3roly".to_string(),
            repo: "firefox-dynasty".to_string(),
            api_base: "https://api.github.com".to_string(),
            probe_url: "https://github.com".to_string(),
            release_limit: 10,
            user_agent: format!("dynasty-installer/{}", env!("CARGO_PKG_VERSION")),
            accept_invalid_certs: true,
        }
    }
}

// ============================================================================
// Bundle Layout
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BundleConfig {
    /// Human readable name used in dialogs
    pub app_name: String,
    pub bundle_id: String,
    pub bundle_name: String,
    /// Entries outside this prefix are ignored when unpacking
    pub archive_prefix: String,
    /// Main executable, relative to the content root
    pub main_executable: PathBuf,
    pub frameworks_dir: PathBuf,
    pub default_location: PathBuf,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            app_name: "Firefox Dynasty".to_string(),
            bundle_id: "org.mozilla.firefox".to_string(),
            bundle_name: "Firefox.app".to_string(),
            archive_prefix: "Firefox.app/Contents/".to_string(),
            main_executable: PathBuf::from("MacOS/firefox"),
            frameworks_dir: PathBuf::from("Frameworks"),
            default_location: PathBuf::from("/Applications"),
        }
    }
}

impl BundleConfig {
    /// Content directory name inside the bundle, e.g. `Contents`
    pub fn content_dir(&self) -> PathBuf {
        let trimmed = self.archive_prefix.trim_end_matches('/');
        match trimmed.split_once('/') {
            Some((_, rest)) => PathBuf::from(rest),
            None => PathBuf::new(),
        }
    }
}

// ============================================================================
// External Tools
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ToolsConfig {
    /// Load-command patcher, relative to the installation root
    pub patcher: PathBuf,
    /// Ad-hoc signer, relative to the installation root
    pub signer: PathBuf,
    /// Library injected into the main executable. Must also be part of the overlay.
    pub injected_library: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            patcher: PathBuf::from("insert_dylib"),
            signer: PathBuf::from("jtool2"),
            injected_library: "FirefoxModifier.dylib".to_string(),
        }
    }
}

// ============================================================================
// Overlay
// ============================================================================

/// A local file or directory copied into the staging tree after extraction
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OverlayEntry {
    /// Relative to the installation root
    pub source: PathBuf,
    /// Relative to the bundle content root
    pub destination: PathBuf,
}

impl OverlayEntry {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

pub fn default_overlay() -> Vec<OverlayEntry> {
    vec![
        OverlayEntry::new("defaults", "Resources/defaults"),
        OverlayEntry::new("firefox.cfg", "Resources/firefox.cfg"),
        OverlayEntry::new("firefox.icns", "Resources/firefox.icns"),
        OverlayEntry::new("document.icns", "Resources/document.icns"),
        OverlayEntry::new("FirefoxModifier.dylib", "Frameworks/FirefoxModifier.dylib"),
    ]
}

// ============================================================================
// Install Behaviour
// ============================================================================

/// What to do when the patcher or signer reports a failure
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolFailurePolicy {
    /// Log every failure and keep installing
    #[default]
    Warn,
    /// Stop before the install target is touched
    Abort,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct InstallConfig {
    /// Pause after copying before permissions are normalized
    pub settle_delay_ms: u64,
    pub tool_failure: ToolFailurePolicy,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            tool_failure: ToolFailurePolicy::Warn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_dir_strips_bundle_segment() {
        let bundle = BundleConfig::default();
        assert_eq!(bundle.content_dir(), PathBuf::from("Contents"));

        let nested = BundleConfig {
            archive_prefix: "App.app/Contents/MacOS/".to_string(),
            ..BundleConfig::default()
        };
        assert_eq!(nested.content_dir(), PathBuf::from("Contents/MacOS"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "feed": { "owner": "someone" }, "install": { "tool_failure": "abort" } }"#;
        let config: InstallerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.feed.owner, "someone");
        assert_eq!(config.feed.repo, "firefox-dynasty");
        assert_eq!(config.feed.release_limit, 10);
        assert!(config.feed.accept_invalid_certs);
        assert_eq!(config.install.tool_failure, ToolFailurePolicy::Abort);
        assert_eq!(config.install.settle_delay_ms, 1000);
    }

    #[test]
    fn test_default_overlay_order() {
        let overlay = default_overlay();
        let destinations: Vec<_> = overlay.iter().map(|e| e.destination.clone()).collect();
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("Resources/defaults"),
                PathBuf::from("Resources/firefox.cfg"),
                PathBuf::from("Resources/firefox.icns"),
                PathBuf::from("Resources/document.icns"),
                PathBuf::from("Frameworks/FirefoxModifier.dylib"),
            ]
        );
    }

    #[test]
    fn test_load_from_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(InstallerConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_save_to_reports_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = InstallerConfig::default();
        config.install.tool_failure = ToolFailurePolicy::Abort;

        let path = dir.path().join("nested/config.json");
        config.save_to(&path).unwrap();
        let loaded = InstallerConfig::load_from(&path).unwrap();
        assert_eq!(loaded.install.tool_failure, ToolFailurePolicy::Abort);

        // Parent is a regular file, so the directory cannot be created
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        assert!(config.save_to(&blocker.join("config.json")).is_err());
    }
}
