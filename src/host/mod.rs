//! Host integration: operator dialogs and installed-application lookup
//!
//! The install pipeline only talks to the traits defined here. Desktop
//! implementations use AppleScript and native dialogs; the console
//! implementation works over stdin/stdout.

pub mod console;
#[cfg(feature = "full")]
pub mod desktop;
pub mod osascript;

use std::path::{Path, PathBuf};

pub use console::ConsoleOperator;
#[cfg(feature = "full")]
pub use desktop::DesktopOperator;
pub use osascript::FinderLookup;

/// Everything the pipeline needs to ask of, or tell, the person running it
pub trait Operator {
    /// Pick one of `options`. `None` when dismissed.
    fn choose_one(&self, title: &str, prompt: &str, options: &[String]) -> Option<String>;

    /// Pick a directory, starting at `default`. `None` when dismissed.
    fn choose_folder(&self, prompt: &str, default: &Path) -> Option<PathBuf>;

    /// Blocking error message
    fn alert(&self, message: &str);

    /// Blocking acknowledgement with a single button
    fn notify(&self, message: &str);
}

/// Finds where the host has an application installed
pub trait BundleLookup {
    fn locate(&self, bundle_id: &str) -> Option<PathBuf>;
}

/// Lookup that never finds anything, for hosts without an application registry
pub struct NoLookup;

impl BundleLookup for NoLookup {
    fn locate(&self, _bundle_id: &str) -> Option<PathBuf> {
        None
    }
}
