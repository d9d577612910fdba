//! AppleScript helpers
//!
//! Dynamic values are passed as script arguments (`on run argv`) so nothing
//! ever has to be quoted into the script text.

use std::path::PathBuf;
use std::process::Command;

use super::BundleLookup;
use crate::logging::log_warning;

/// Run an AppleScript made of `lines` with `args` as `argv`.
/// Returns trimmed stdout on success.
pub fn run_script(lines: &[&str], args: &[&str]) -> Option<String> {
    let mut cmd = Command::new("osascript");
    for line in lines {
        cmd.arg("-e").arg(line);
    }
    cmd.args(args);

    match cmd.output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log_warning(&format!("osascript failed: {}", stderr.trim()));
            None
        }
        Err(e) => {
            log_warning(&format!("Failed to run osascript: {}", e));
            None
        }
    }
}

const CHOOSE_FROM_LIST: &[&str] = &[
    "on run argv",
    "set theTitle to item 1 of argv",
    "set thePrompt to item 2 of argv",
    "set theItems to items 3 thru -1 of argv",
    "set picked to choose from list theItems with title theTitle with prompt thePrompt",
    "if picked is false then return \"\"",
    "return item 1 of picked",
    "end run",
];

/// `choose from list` dialog
pub fn choose_from_list(title: &str, prompt: &str, options: &[String]) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let mut args = vec![title, prompt];
    args.extend(options.iter().map(String::as_str));

    run_script(CHOOSE_FROM_LIST, &args).filter(|choice| !choice.is_empty())
}

const APPLICATION_PATH: &[&str] = &[
    "on run argv",
    "set bundleId to item 1 of argv",
    "tell application \"Finder\" to return POSIX path of (application file id bundleId as text)",
    "end run",
];

/// Asks Finder where the application with a given bundle id lives
pub struct FinderLookup;

impl BundleLookup for FinderLookup {
    fn locate(&self, bundle_id: &str) -> Option<PathBuf> {
        run_script(APPLICATION_PATH, &[bundle_id])
            .filter(|path| !path.is_empty())
            .map(|path| PathBuf::from(path.trim_end_matches('/')))
    }
}
