//! Native dialog operator

use std::path::{Path, PathBuf};

use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};

use super::{osascript, Operator};

/// Operator backed by native dialogs.
///
/// List selection goes through AppleScript since there is no native list
/// picker in `rfd`; everything else uses `rfd`.
pub struct DesktopOperator {
    title: String,
}

impl DesktopOperator {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Operator for DesktopOperator {
    fn choose_one(&self, title: &str, prompt: &str, options: &[String]) -> Option<String> {
        osascript::choose_from_list(title, prompt, options)
    }

    fn choose_folder(&self, prompt: &str, default: &Path) -> Option<PathBuf> {
        FileDialog::new()
            .set_title(prompt)
            .set_directory(default)
            .pick_folder()
    }

    fn alert(&self, message: &str) {
        MessageDialog::new()
            .set_level(MessageLevel::Error)
            .set_title(&self.title)
            .set_description(message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }

    fn notify(&self, message: &str) {
        MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title(&self.title)
            .set_description(message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }
}
