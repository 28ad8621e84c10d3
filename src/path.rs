// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine the default locations that discovery searches through when the
//! caller does not supply its own.

use std::path::PathBuf;

/// Directory systemd loads system service units from.
pub const SYSTEMD_SERVICE_DIR: &str = "/etc/systemd/system";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Default absolute path to the systemd service unit directory.
///
/// Moonraker installers (KIAUH, MainsailOS, FluiddPi, etc.) all register
/// their units here.
pub fn default_service_dir() -> PathBuf {
    PathBuf::from(SYSTEMD_SERVICE_DIR)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
