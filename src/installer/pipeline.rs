//! The install pipeline
//!
//! Runs strictly in order, with no way back to an earlier stage:
//! connectivity check, release listing and selection, download, extraction,
//! overlay, library injection, signing, target resolution, swap, cleanup and
//! the completion notice.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::overlay::apply_overlay;
use super::swap::swap_into;
use super::target::TargetResolver;
use super::tools::{library_reference, patch_binary, sign_tree, ToolOutcome, ToolReport, ToolRunner};
use super::unpack::unpack_archive;
use super::{InstallError, Stage, TaskContext};
use crate::config::{InstallerConfig, ToolFailurePolicy};
use crate::github::{GithubRelease, ReleaseFeed};
use crate::host::{BundleLookup, Operator};
use crate::logging::{log_error, log_install, log_warning};

const CONNECTIVITY_ALERT: &str =
    "Could not connect to Github. Please make sure you are connected to the internet, or try again later.";

/// Choices that would otherwise be asked of the operator
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    /// Install this tag instead of asking
    pub tag: Option<String>,
    /// Install into this bundle path instead of resolving one
    pub target: Option<PathBuf>,
}

/// What a completed run did
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub tag: String,
    pub target: PathBuf,
    pub patch: ToolOutcome,
    pub signing: ToolReport,
}

pub struct Pipeline<'a> {
    config: &'a InstallerConfig,
    install_root: PathBuf,
    feed: &'a dyn ReleaseFeed,
    operator: &'a dyn Operator,
    lookup: &'a dyn BundleLookup,
    runner: &'a dyn ToolRunner,
    resolver: TargetResolver,
    ctx: TaskContext,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a InstallerConfig,
        install_root: PathBuf,
        feed: &'a dyn ReleaseFeed,
        operator: &'a dyn Operator,
        lookup: &'a dyn BundleLookup,
        runner: &'a dyn ToolRunner,
    ) -> Self {
        Self {
            config,
            install_root,
            feed,
            operator,
            lookup,
            runner,
            resolver: TargetResolver::for_current_user(),
            ctx: TaskContext::silent(),
        }
    }

    pub fn with_resolver(mut self, resolver: TargetResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_context(mut self, ctx: TaskContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Run every stage. Fatal errors are logged and shown to the operator
    /// before being returned; a cancelled dialog is returned silently.
    pub fn run(&self, request: &InstallRequest) -> Result<InstallReport, InstallError> {
        match self.run_stages(request) {
            Ok(report) => Ok(report),
            Err(InstallError::Cancelled) => {
                log_install("Installation cancelled");
                Err(InstallError::Cancelled)
            }
            Err(e) => {
                log_error(&e.to_string());
                let message = match &e {
                    InstallError::Connectivity { .. } => CONNECTIVITY_ALERT.to_string(),
                    other => other.to_string(),
                };
                self.operator.alert(&message);
                Err(e)
            }
        }
    }

    fn run_stages(&self, request: &InstallRequest) -> Result<InstallReport, InstallError> {
        let bundle = &self.config.bundle;

        self.ctx.enter(Stage::CheckConnectivity);
        self.feed.check_connectivity()?;

        self.ctx.enter(Stage::ListReleases);
        let releases = self.feed.list_releases(self.config.feed.release_limit)?;
        if releases.is_empty() {
            return Err(InstallError::NoReleases);
        }

        self.ctx.enter(Stage::SelectRelease);
        let release = self.select_release(&releases, request.tag.as_deref())?;
        log_install(&format!("Selected release {}", release.tag_name));

        self.ctx.enter(Stage::Download);
        let asset = release.first_asset().ok_or_else(|| InstallError::NoAssets {
            tag: release.tag_name.clone(),
        })?;
        let archive = tempfile::Builder::new()
            .prefix("dynasty-download")
            .suffix(".zip")
            .tempfile()?;
        self.feed.download(asset, archive.path())?;

        self.ctx.enter(Stage::Extract);
        let staging = unpack_archive(archive.path(), &bundle.archive_prefix)?;
        // Not needed past this point
        if let Err(e) = archive.close() {
            log_warning(&format!("Could not delete downloaded archive: {}", e));
        }
        let content = staging.content_root();

        self.ctx.enter(Stage::Overlay);
        apply_overlay(&self.config.overlay, &self.install_root, content)?;

        self.ctx.enter(Stage::PatchBinary);
        let patch = patch_binary(
            self.runner,
            &self.tool_path(&self.config.tools.patcher),
            &library_reference(&bundle.frameworks_dir, &self.config.tools.injected_library),
            &content.join(&bundle.main_executable),
        );

        self.ctx.enter(Stage::SignTree);
        let signing = sign_tree(self.runner, &self.tool_path(&self.config.tools.signer), content);
        self.check_tools(&patch, &signing)?;

        self.ctx.enter(Stage::ResolveTarget);
        let target = match &request.target {
            Some(target) => target.clone(),
            None => self.resolver.resolve(bundle, self.lookup, self.operator)?,
        };
        log_install(&format!("Install target: {:?}", target));

        self.ctx.enter(Stage::Swap);
        swap_into(
            content,
            &target,
            &bundle.content_dir(),
            Duration::from_millis(self.config.install.settle_delay_ms),
        )?;

        self.ctx.enter(Stage::Cleanup);
        if let Err(e) = staging.close() {
            log_warning(&format!("Could not delete staging directory: {}", e));
        }

        self.ctx.enter(Stage::Notify);
        log_install(&format!("{} {} installed to {:?}", bundle.app_name, release.tag_name, target));
        self.operator.notify(&format!(
            "Your new copy of {} has been installed.",
            bundle.app_name
        ));

        Ok(InstallReport {
            tag: release.tag_name.clone(),
            target,
            patch,
            signing,
        })
    }

    fn select_release<'r>(
        &self,
        releases: &'r [GithubRelease],
        preselected: Option<&str>,
    ) -> Result<&'r GithubRelease, InstallError> {
        let tag = match preselected {
            Some(tag) => tag.to_string(),
            None => {
                let tags: Vec<String> = releases.iter().map(|r| r.tag_name.clone()).collect();
                let title = format!("{} Downloader", self.config.bundle.bundle_name.trim_end_matches(".app"));
                let prompt = format!("Choose a version of {} to install.", self.config.bundle.app_name);
                self.operator
                    .choose_one(&title, &prompt, &tags)
                    .ok_or(InstallError::Cancelled)?
            }
        };

        releases
            .iter()
            .find(|r| r.tag_name == tag)
            .ok_or(InstallError::UnknownRelease { tag })
    }

    fn tool_path(&self, tool: &Path) -> PathBuf {
        self.install_root.join(tool)
    }

    fn check_tools(&self, patch: &ToolOutcome, signing: &ToolReport) -> Result<(), InstallError> {
        if patch.is_success() && signing.is_clean() {
            return Ok(());
        }

        match self.config.install.tool_failure {
            ToolFailurePolicy::Abort if !patch.is_success() => Err(InstallError::ToolFailed {
                tool: self.config.tools.patcher.display().to_string(),
                failures: 1,
            }),
            ToolFailurePolicy::Abort => Err(InstallError::ToolFailed {
                tool: self.config.tools.signer.display().to_string(),
                failures: signing.failure_count(),
            }),
            ToolFailurePolicy::Warn => {
                log_warning(&format!(
                    "Continuing despite tool failures (patch ok: {}, signing failures: {})",
                    patch.is_success(),
                    signing.failure_count()
                ));
                Ok(())
            }
        }
    }
}
