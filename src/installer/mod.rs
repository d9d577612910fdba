//! Bundle installation logic

mod common;
pub mod overlay;
pub mod pipeline;
pub mod swap;
pub mod target;
pub mod tools;
pub mod unpack;

pub use common::InstallError;
pub use pipeline::{InstallReport, InstallRequest, Pipeline};
pub use target::TargetResolver;
pub use tools::{SystemRunner, ToolOutcome, ToolReport, ToolRunner, ToolStatus};
pub use unpack::{unpack_archive, StagingTree};

use std::fmt;
use std::sync::Arc;

// ============================================================================
// Stages
// ============================================================================

/// Pipeline stages, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckConnectivity,
    ListReleases,
    SelectRelease,
    Download,
    Extract,
    Overlay,
    PatchBinary,
    SignTree,
    ResolveTarget,
    Swap,
    Cleanup,
    Notify,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::CheckConnectivity,
        Stage::ListReleases,
        Stage::SelectRelease,
        Stage::Download,
        Stage::Extract,
        Stage::Overlay,
        Stage::PatchBinary,
        Stage::SignTree,
        Stage::ResolveTarget,
        Stage::Swap,
        Stage::Cleanup,
        Stage::Notify,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::CheckConnectivity => "Checking connection...",
            Stage::ListReleases => "Fetching release list...",
            Stage::SelectRelease => "Waiting for release selection...",
            Stage::Download => "Downloading release...",
            Stage::Extract => "Extracting...",
            Stage::Overlay => "Copying preferences and resources...",
            Stage::PatchBinary => "Injecting library...",
            Stage::SignTree => "Signing files...",
            Stage::ResolveTarget => "Choosing install location...",
            Stage::Swap => "Installing...",
            Stage::Cleanup => "Cleaning up...",
            Stage::Notify => "Done",
        }
    }

    /// Fraction of the run completed when this stage starts
    pub fn progress(&self) -> f32 {
        let index = Stage::ALL.iter().position(|s| s == self).unwrap_or(0);
        index as f32 / (Stage::ALL.len() - 1) as f32
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// Task Context
// ============================================================================

/// Status and progress sinks for a running install
#[derive(Clone)]
pub struct TaskContext {
    pub status_callback: Arc<dyn Fn(String) + Send + Sync>,
    pub progress_callback: Arc<dyn Fn(f32) + Send + Sync>,
}

impl TaskContext {
    pub fn new(
        status: impl Fn(String) + Send + Sync + 'static,
        progress: impl Fn(f32) + Send + Sync + 'static,
    ) -> Self {
        Self {
            status_callback: Arc::new(status),
            progress_callback: Arc::new(progress),
        }
    }

    /// Discards everything
    pub fn silent() -> Self {
        Self::new(|_| {}, |_| {})
    }

    pub fn set_status(&self, msg: String) {
        (self.status_callback)(msg);
    }

    pub fn set_progress(&self, p: f32) {
        (self.progress_callback)(p);
    }

    pub fn enter(&self, stage: Stage) {
        self.set_progress(stage.progress());
        self.set_status(stage.label().to_string());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the installer tests

    use std::ffi::OsString;
    use std::fs;
    use std::io::{self, Write};
    use std::os::unix::process::ExitStatusExt;
    use std::path::{Path, PathBuf};
    use std::process::ExitStatus;

    use parking_lot::Mutex;
    use zip::write::SimpleFileOptions;

    use super::ToolRunner;
    use crate::host::{BundleLookup, Operator};

    pub struct ZipFixture {
        name: &'static str,
        contents: Option<&'static [u8]>,
        mode: u32,
    }

    impl ZipFixture {
        pub fn dir(name: &'static str) -> Self {
            Self { name, contents: None, mode: 0o755 }
        }

        pub fn file(name: &'static str, contents: &'static [u8], mode: u32) -> Self {
            Self { name, contents: Some(contents), mode }
        }
    }

    pub fn write_zip(path: &Path, entries: &[ZipFixture]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for entry in entries {
            let options = SimpleFileOptions::default().unix_permissions(entry.mode);
            match entry.contents {
                None => zip.add_directory(entry.name, options).unwrap(),
                Some(bytes) => {
                    zip.start_file(entry.name, options).unwrap();
                    zip.write_all(bytes).unwrap();
                }
            }
        }
        zip.finish().unwrap();
    }

    /// Records invocations; fails those whose last argument names `fail_on`
    #[derive(Default)]
    pub struct RecordingRunner {
        calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
        fail_on: Option<String>,
    }

    impl RecordingRunner {
        pub fn failing_on(file_name: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: Some(file_name.to_string()),
            }
        }

        pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
            self.calls.lock().clone()
        }
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ExitStatus> {
            let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
            let fails = match (&self.fail_on, args.last()) {
                (Some(name), Some(last)) => {
                    Path::new(last).file_name().is_some_and(|f| f == name.as_str())
                }
                _ => false,
            };
            self.calls.lock().push((program.to_path_buf(), args));
            // Raw wait status: exit code lives in the second byte
            Ok(ExitStatus::from_raw(if fails { 1 << 8 } else { 0 }))
        }
    }

    pub struct FixedLookup(pub Option<PathBuf>);

    impl BundleLookup for FixedLookup {
        fn locate(&self, _bundle_id: &str) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    /// Operator with canned answers that remembers what it was asked
    #[derive(Default)]
    pub struct ScriptedOperator {
        choice: Option<String>,
        folder: Option<PathBuf>,
        offered: Mutex<Vec<Vec<String>>>,
        folder_prompts: Mutex<Vec<(String, PathBuf)>>,
        alerts: Mutex<Vec<String>>,
        notices: Mutex<Vec<String>>,
    }

    impl ScriptedOperator {
        pub fn with_choice(mut self, choice: &str) -> Self {
            self.choice = Some(choice.to_string());
            self
        }

        pub fn with_folder(mut self, folder: PathBuf) -> Self {
            self.folder = Some(folder);
            self
        }

        pub fn offered(&self) -> Vec<Vec<String>> {
            self.offered.lock().clone()
        }

        pub fn folder_prompts(&self) -> Vec<(String, PathBuf)> {
            self.folder_prompts.lock().clone()
        }

        pub fn alerts(&self) -> Vec<String> {
            self.alerts.lock().clone()
        }

        pub fn notices(&self) -> Vec<String> {
            self.notices.lock().clone()
        }
    }

    impl Operator for ScriptedOperator {
        fn choose_one(&self, _title: &str, _prompt: &str, options: &[String]) -> Option<String> {
            self.offered.lock().push(options.to_vec());
            self.choice.clone()
        }

        fn choose_folder(&self, prompt: &str, default: &Path) -> Option<PathBuf> {
            self.folder_prompts
                .lock()
                .push((prompt.to_string(), default.to_path_buf()));
            self.folder.clone()
        }

        fn alert(&self, message: &str) {
            self.alerts.lock().push(message.to_string());
        }

        fn notify(&self, message: &str) {
            self.notices.lock().push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progress_is_monotonic() {
        let progress: Vec<f32> = Stage::ALL.iter().map(Stage::progress).collect();
        assert_eq!(progress.first(), Some(&0.0));
        assert_eq!(progress.last(), Some(&1.0));
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
    }
}
