//! External tool invocations: load-command patching and ad-hoc signing
//!
//! Tools are run with argument lists, never through a shell. Every invocation
//! produces a [`ToolOutcome`]; what happens on failure is decided by the caller.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use walkdir::WalkDir;

use crate::logging::{log_install, log_warning};

/// Runs an external program to completion
pub trait ToolRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ExitStatus>;
}

/// [`ToolRunner`] that spawns real processes
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ExitStatus> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                log_warning(&format!("{}: {}", program.display(), stderr));
            }
        }
        Ok(output.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Succeeded,
    /// Exited unsuccessfully. `None` when killed by a signal.
    Failed { code: Option<i32> },
    /// Could not be started at all
    NotRun { reason: String },
}

/// Result of one tool invocation against one file
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool: PathBuf,
    pub target: PathBuf,
    pub status: ToolStatus,
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Succeeded
    }
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tool = self.tool.file_name().unwrap_or(self.tool.as_os_str());
        match &self.status {
            ToolStatus::Succeeded => write!(f, "{:?} ok on {:?}", tool, self.target),
            ToolStatus::Failed { code: Some(code) } => {
                write!(f, "{:?} exited with {} on {:?}", tool, code, self.target)
            }
            ToolStatus::Failed { code: None } => {
                write!(f, "{:?} was terminated on {:?}", tool, self.target)
            }
            ToolStatus::NotRun { reason } => {
                write!(f, "{:?} could not run on {:?}: {}", tool, self.target, reason)
            }
        }
    }
}

/// Outcomes of one step, in invocation order
#[derive(Debug, Clone, Default)]
pub struct ToolReport {
    pub outcomes: Vec<ToolOutcome>,
}

impl ToolReport {
    pub fn failures(&self) -> impl Iterator<Item = &ToolOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

fn invoke(runner: &dyn ToolRunner, tool: &Path, args: Vec<OsString>, target: &Path) -> ToolOutcome {
    let status = match runner.run(tool, &args) {
        Ok(status) if status.success() => ToolStatus::Succeeded,
        Ok(status) => ToolStatus::Failed {
            code: status.code(),
        },
        Err(e) => ToolStatus::NotRun {
            reason: e.to_string(),
        },
    };

    let outcome = ToolOutcome {
        tool: tool.to_path_buf(),
        target: target.to_path_buf(),
        status,
    };
    if !outcome.is_success() {
        log_warning(&outcome.to_string());
    }
    outcome
}

/// Make `executable` load `library_ref` at launch.
///
/// `library_ref` is an `@executable_path`-relative reference so it stays valid
/// wherever the bundle ends up. The existing code signature is stripped.
pub fn patch_binary(
    runner: &dyn ToolRunner,
    patcher: &Path,
    library_ref: &str,
    executable: &Path,
) -> ToolOutcome {
    log_install(&format!("Injecting {} into {:?}", library_ref, executable));
    let args = vec![
        OsString::from("--inplace"),
        OsString::from("--strip-codesig"),
        OsString::from("--all-yes"),
        OsString::from(library_ref),
        executable.as_os_str().to_os_string(),
    ];
    invoke(runner, patcher, args, executable)
}

/// Ad-hoc sign every regular file under `root`, in traversal order
pub fn sign_tree(runner: &dyn ToolRunner, signer: &Path, root: &Path) -> ToolReport {
    let mut report = ToolReport::default();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log_warning(&format!("Skipping unreadable entry while signing: {}", e));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let args = vec![
            OsString::from("--sign"),
            OsString::from("--inplace"),
            entry.path().as_os_str().to_os_string(),
        ];
        report.outcomes.push(invoke(runner, signer, args, entry.path()));
    }

    log_install(&format!(
        "Signed {} files ({} failed)",
        report.outcomes.len(),
        report.failure_count()
    ));
    report
}

/// Reference to a library inside the bundle's frameworks directory, relative
/// to the main executable (`MacOS/<exe>`)
pub fn library_reference(frameworks_dir: &Path, library: &str) -> String {
    let relative = Path::new("..").join(frameworks_dir).join(OsStr::new(library));
    format!("@executable_path/{}", relative.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::test_support::RecordingRunner;
    use std::fs;

    #[test]
    fn test_library_reference() {
        assert_eq!(
            library_reference(Path::new("Frameworks"), "FirefoxModifier.dylib"),
            "@executable_path/../Frameworks/FirefoxModifier.dylib"
        );
    }

    #[test]
    fn test_patch_arguments() {
        let runner = RecordingRunner::default();
        let outcome = patch_binary(
            &runner,
            Path::new("/opt/tools/insert_dylib"),
            "@executable_path/../Frameworks/Lib.dylib",
            Path::new("/tmp/stage/Contents/MacOS/firefox"),
        );

        assert!(outcome.is_success());
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PathBuf::from("/opt/tools/insert_dylib"));
        assert_eq!(
            calls[0].1,
            vec![
                "--inplace",
                "--strip-codesig",
                "--all-yes",
                "@executable_path/../Frameworks/Lib.dylib",
                "/tmp/stage/Contents/MacOS/firefox",
            ]
        );
    }

    #[test]
    fn test_sign_tree_signs_every_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("MacOS")).unwrap();
        fs::create_dir_all(dir.path().join("Resources/empty")).unwrap();
        fs::write(dir.path().join("MacOS/firefox"), "bin").unwrap();
        fs::write(dir.path().join("Resources/x.txt"), "x").unwrap();
        std::os::unix::fs::symlink("x.txt", dir.path().join("Resources/link")).unwrap();

        let runner = RecordingRunner::default();
        let report = sign_tree(&runner, Path::new("jtool2"), dir.path());

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.is_clean());

        let mut signed = Vec::new();
        for (_, args) in runner.calls() {
            assert_eq!(&args[..2], ["--sign", "--inplace"]);
            signed.push(args[2].clone());
        }
        signed.sort();
        assert_eq!(
            signed,
            vec![
                dir.path().join("MacOS/firefox").display().to_string(),
                dir.path().join("Resources/x.txt").display().to_string(),
            ]
        );
    }

    #[test]
    fn test_failures_are_reported_not_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), "a").unwrap();
        fs::write(dir.path().join("b"), "b").unwrap();

        let runner = RecordingRunner::failing_on("b");
        let report = sign_tree(&runner, Path::new("jtool2"), dir.path());

        assert_eq!(report.failure_count(), 1);
        let failed = report.failures().next().unwrap();
        assert_eq!(failed.target, dir.path().join("b"));
        assert_eq!(failed.status, ToolStatus::Failed { code: Some(1) });
    }

    #[test]
    fn test_missing_tool_is_not_run() {
        let outcome = patch_binary(
            &SystemRunner,
            Path::new("/nonexistent/insert_dylib"),
            "@executable_path/../Frameworks/Lib.dylib",
            Path::new("/nonexistent/firefox"),
        );
        assert!(matches!(outcome.status, ToolStatus::NotRun { .. }));
    }
}
