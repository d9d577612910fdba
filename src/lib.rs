//! Dynasty Installer
//!
//! Library crate for the installer core: release feed, unpacking, library
//! injection, signing and installing over an existing application bundle.
//! Native dialogs are only compiled with the `full` feature.

pub mod paths;
pub mod config;
pub mod github;
pub mod host;
pub mod installer;
pub mod logging;
pub mod utils;
