//! Dynasty Installer
//!
//! Downloads a release, injects the modifier library, re-signs the bundle and
//! installs it over the existing application.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use dynasty_installer::config::{InstallerConfig, ToolFailurePolicy};
use dynasty_installer::github::GithubFeed;
use dynasty_installer::host::{BundleLookup, ConsoleOperator, DesktopOperator, FinderLookup, NoLookup, Operator};
use dynasty_installer::installer::{InstallError, InstallRequest, Pipeline, SystemRunner, TaskContext};
use dynasty_installer::logging::{init_logger, log_error, log_info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file to use instead of the one in the data directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the helper tools and overlay files
    #[arg(long)]
    root: Option<PathBuf>,

    /// Install this release tag without asking
    #[arg(long)]
    tag: Option<String>,

    /// Install into this bundle path without looking for an existing copy
    #[arg(long)]
    target: Option<PathBuf>,

    /// Abort when patching or signing fails instead of installing anyway
    #[arg(long)]
    strict: bool,

    /// Verify TLS certificates of the release feed
    #[arg(long)]
    verify_certs: bool,

    /// Ask questions on the terminal instead of with dialogs
    #[arg(long)]
    console: bool,

    /// Save the effective configuration to the data directory and exit
    #[arg(long)]
    write_config: bool,
}

fn load_config(args: &Args) -> Result<(InstallerConfig, PathBuf), InstallError> {
    let mut config = match &args.config {
        Some(path) => InstallerConfig::load_from(path)?,
        None => InstallerConfig::load(),
    };

    if let Some(root) = &args.root {
        config.install_root = Some(root.clone());
    }
    if args.strict {
        config.install.tool_failure = ToolFailurePolicy::Abort;
    }
    if args.verify_certs {
        config.feed.accept_invalid_certs = false;
    }
    // Resolve "path to self" once, up front
    let install_root = config.resolve_install_root();
    config.install_root = Some(install_root.clone());

    Ok((config, install_root))
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logger();
    log_info("Dynasty Installer starting up...");

    let (config, install_root) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            log_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    if args.write_config {
        return match config.save() {
            Ok(path) => {
                log_info(&format!("Configuration saved to {:?}", path));
                ExitCode::SUCCESS
            }
            Err(e) => {
                log_error(&format!("Could not save configuration: {}", e));
                ExitCode::FAILURE
            }
        };
    }

    let operator: Box<dyn Operator> = if args.console {
        Box::new(ConsoleOperator::stdio())
    } else {
        Box::new(DesktopOperator::new(format!("{} Installer", config.bundle.app_name)))
    };

    let feed = match GithubFeed::new(&config.feed) {
        Ok(feed) => feed,
        Err(e) => {
            log_error(&e.to_string());
            operator.alert(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    log_info(&format!("Installation root: {:?}", install_root));

    let ctx = TaskContext::new(
        |status| log_info(&status),
        |progress| log_info(&format!("Progress: {:.0}%", progress * 100.0)),
    );
    let request = InstallRequest {
        tag: args.tag.clone(),
        target: args.target.clone(),
    };

    // Finder is the only application registry we know how to ask
    let lookup: &dyn BundleLookup = if cfg!(target_os = "macos") {
        &FinderLookup
    } else {
        &NoLookup
    };

    let pipeline = Pipeline::new(
        &config,
        install_root,
        &feed,
        operator.as_ref(),
        lookup,
        &SystemRunner,
    )
    .with_context(ctx);

    match pipeline.run(&request) {
        Ok(report) => {
            if !report.patch.is_success() || !report.signing.is_clean() {
                log_info(&format!(
                    "Installed with {} tool failure(s); see warnings above",
                    report.signing.failure_count() + usize::from(!report.patch.is_success())
                ));
            }
            ExitCode::SUCCESS
        }
        Err(InstallError::Cancelled) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
