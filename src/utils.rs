//! Shared utility functions used across the application

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::installer::InstallError;

/// Download a file from URL to the specified path
pub fn download_file(agent: &ureq::Agent, url: &str, path: &Path) -> Result<(), InstallError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let resp = agent.get(url).call()?;
    let mut reader = resp.into_reader();
    let mut file = fs::File::create(path)?;
    std::io::copy(&mut reader, &mut file)?;
    file.flush()?;
    Ok(())
}
