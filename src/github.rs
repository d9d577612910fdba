//! GitHub release feed client
//!
//! Lists releases of the configured repository, probes connectivity and
//! downloads release assets.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::FeedConfig;
use crate::installer::InstallError;
use crate::logging::{log_download, log_info, log_warning};
use crate::utils::download_file;

/// GitHub release metadata
#[derive(Deserialize, Debug, Clone)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

impl GithubRelease {
    /// Assets are picked by position, never by name
    pub fn first_asset(&self) -> Option<&GithubAsset> {
        self.assets.first()
    }
}

/// GitHub release asset
#[derive(Deserialize, Debug, Clone)]
pub struct GithubAsset {
    #[serde(default)]
    pub name: String,
    pub browser_download_url: String,
}

/// Source of releases for the install pipeline
pub trait ReleaseFeed {
    /// Whether the feed's host answers at all
    fn check_connectivity(&self) -> Result<(), InstallError>;

    /// Up to `limit` most recent releases, newest first
    fn list_releases(&self, limit: usize) -> Result<Vec<GithubRelease>, InstallError>;

    /// Download an asset to `dest`
    fn download(&self, asset: &GithubAsset, dest: &Path) -> Result<(), InstallError>;
}

/// [`ReleaseFeed`] backed by the GitHub REST API
pub struct GithubFeed {
    agent: ureq::Agent,
    /// Same transport with redirects off, so the probe sees the first response
    probe_agent: ureq::Agent,
    config: FeedConfig,
}

impl GithubFeed {
    pub fn new(config: &FeedConfig) -> Result<Self, InstallError> {
        if config.accept_invalid_certs {
            log_warning("TLS certificate verification is disabled for the release feed");
        }

        Ok(Self {
            agent: agent_builder(config)?.build(),
            probe_agent: agent_builder(config)?.redirects(0).build(),
            config: config.clone(),
        })
    }

    fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.config.api_base.trim_end_matches('/'),
            self.config.owner,
            self.config.repo
        )
    }
}

impl ReleaseFeed for GithubFeed {
    fn check_connectivity(&self) -> Result<(), InstallError> {
        let url = &self.config.probe_url;
        let status_line = match self.probe_agent.head(url).call() {
            Ok(response) => format!(
                "{} {} {}",
                response.http_version(),
                response.status(),
                response.status_text()
            ),
            Err(ureq::Error::Status(code, response)) => {
                format!("{} {} {}", response.http_version(), code, response.status_text())
            }
            Err(e) => {
                log_warning(&format!("Connectivity probe to {} failed: {}", url, e));
                return Err(InstallError::Connectivity {
                    host: url.clone(),
                    reason: e.to_string(),
                });
            }
        };

        if probe_succeeded(&status_line) {
            log_info(&format!("Connectivity probe OK: {}", status_line));
            Ok(())
        } else {
            Err(InstallError::Connectivity {
                host: url.clone(),
                reason: status_line,
            })
        }
    }

    fn list_releases(&self, limit: usize) -> Result<Vec<GithubRelease>, InstallError> {
        let url = self.releases_url();
        log_info(&format!("Fetching up to {} releases from {}", limit, url));

        let releases: Vec<GithubRelease> = self
            .agent
            .get(&url)
            .query("per_page", &limit.to_string())
            .call()
            .map_err(|e| InstallError::Feed {
                reason: e.to_string(),
            })?
            .into_json()
            .map_err(|e| InstallError::Feed {
                reason: format!("Malformed release list: {}", e),
            })?;

        Ok(releases)
    }

    fn download(&self, asset: &GithubAsset, dest: &Path) -> Result<(), InstallError> {
        log_download(&format!("Downloading {}", asset.browser_download_url));
        download_file(&self.agent, &asset.browser_download_url, dest)?;
        log_download(&format!("Saved to {:?}", dest));
        Ok(())
    }
}

fn agent_builder(config: &FeedConfig) -> Result<ureq::AgentBuilder, InstallError> {
    let builder = ureq::AgentBuilder::new().user_agent(&config.user_agent);
    if !config.accept_invalid_certs {
        return Ok(builder);
    }

    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| InstallError::Other {
            context: "TLS setup".to_string(),
            reason: e.to_string(),
        })?;
    Ok(builder.tls_connector(Arc::new(connector)))
}

/// A probe succeeds when its status line mentions 200
pub fn probe_succeeded(status_line: &str) -> bool {
    status_line.contains("200")
}
