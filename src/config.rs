// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the installer settings file to simplify the process
//! of serialization and deserialization. File I/O is left to the caller to
//! figure out.
//!
//! # General Layout
//!
//! The settings file is composed of two optional sections. The `moonraker`
//! section names an instance that is already known, and the `discovery`
//! section tweaks where and how instances are searched for. A settings file
//! with a complete `moonraker` section lets discovery skip scanning entirely,
//! which is why the result of a run is written out in this very layout.

use crate::discovery::ResolutionContext;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Installer settings layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct InstallerConfig {
    /// Known Moonraker instance.
    #[serde(default)]
    pub moonraker: MoonrakerSettings,

    /// Discovery tweaks.
    #[serde(default)]
    pub discovery: DiscoverySettings,
}

impl InstallerConfig {
    /// Build resolution context out of settings.
    ///
    /// Uses `home_dir` when the settings do not name a home directory.
    pub fn to_context(&self, home_dir: impl Into<PathBuf>) -> ResolutionContext {
        ResolutionContext {
            config_path: self.moonraker.config_path.clone(),
            service_name: self.moonraker.service_name.clone(),
            home_dir: self
                .discovery
                .home_dir
                .clone()
                .unwrap_or_else(|| home_dir.into()),
            disable_auto_select: self.discovery.disable_auto_select,
        }
    }

    /// Record the instance named by a context in the settings.
    ///
    /// Meant for a context that a [`Resolution`](crate::discovery::Resolution)
    /// was already applied to through [`ResolutionContext::apply`].
    pub fn record(&mut self, context: &ResolutionContext) {
        self.moonraker.config_path = context.config_path.clone();
        self.moonraker.service_name = context.service_name.clone();
    }
}

impl FromStr for InstallerConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: InstallerConfig =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        config.moonraker.config_path = config
            .moonraker
            .config_path
            .map(expand_path)
            .transpose()?;
        config.discovery.service_dir = config
            .discovery
            .service_dir
            .map(expand_path)
            .transpose()?;
        config.discovery.home_dir = config.discovery.home_dir.map(expand_path).transpose()?;

        Ok(config)
    }
}

impl Display for InstallerConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Known Moonraker instance settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct MoonrakerSettings {
    /// Path to the instance's `moonraker.conf`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,

    /// Name of the instance's service unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

/// Discovery settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DiscoverySettings {
    /// Directory to search for service units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_dir: Option<PathBuf>,

    /// Home directory to list in diagnostic output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_dir: Option<PathBuf>,

    /// Always ask which instance to use.
    #[serde(default)]
    pub disable_auto_select: bool,
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
