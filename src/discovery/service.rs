// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Service unit to Moonraker config matching.
//!
//! Moonraker service units never name their `moonraker.conf` directly. What
//! they do name is an environment file, usually
//! `EnvironmentFile=<printer_data>/systemd/moonraker.env`, and that file lives
//! next to the rest of the instance's data. So we read the environment file
//! path out of the unit and search the directories around it.
//!
//! # Search Stages
//!
//! Given `<root>/systemd/moonraker.env`, the stages are tried in order:
//!
//! 1. `<root>/systemd/` itself, which is rare but does happen.
//! 2. `<root>/config/`, the usual home of the config. Searching it explicitly
//!    first keeps us from wandering into sibling folders of the data root.
//! 3. `<root>/` as a last resort.

use crate::discovery::search::{find_moonraker_config, SearchError};

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

const ENV_FILE_MARKER: &str = "moonraker.env";

/// Try to find the Moonraker config that belongs to a service unit.
///
/// Never fails. Problems reading the unit or searching for its config are
/// logged, and the service is simply reported as unmatched.
#[instrument(level = "debug")]
pub fn match_config_for_service(service_file: &Path) -> Option<PathBuf> {
    debug!("search moonraker config for {:?}", service_file.display());
    match try_match(service_file) {
        Ok(found) => found,
        Err(err) => {
            warn!(
                "failed to read service file {:?} for config search: {err}",
                service_file.display()
            );
            None
        }
    }
}

fn try_match(service_file: &Path) -> Result<Option<PathBuf>> {
    let contents = read_to_string(service_file).map_err(|err| ServiceError::ReadUnit {
        source: err,
        path: service_file.to_path_buf(),
    })?;

    for line in contents
        .lines()
        .filter(|line| line.to_lowercase().contains(ENV_FILE_MARKER))
    {
        debug!("found moonraker.env line: {line}");
        let Some(env_file) = parse_env_file_path(line) else {
            continue;
        };

        if let Some(found) = search_around_env_file(&env_file)? {
            return Ok(Some(found));
        }

        debug!("no config found for line {line:?}, looking for more lines");
    }

    Ok(None)
}

/// Extract the path following the last `=` of a unit file line.
///
/// The path ends at the first space after the `=`, or at the end of the line.
/// A leading `-`, which systemd uses to mark the file as optional, is dropped.
/// Return [`None`] if the line has no `=` or nothing follows it.
pub fn parse_env_file_path(line: &str) -> Option<PathBuf> {
    let (_, value) = line.rsplit_once('=')?;
    let value = value.split(' ').next().unwrap_or_default().trim();
    let value = value.strip_prefix('-').unwrap_or(value);
    if value.is_empty() {
        return None;
    }

    Some(PathBuf::from(value))
}

fn search_around_env_file(env_file: &Path) -> Result<Option<PathBuf>> {
    let env_dir = env_file.parent().unwrap_or_else(|| Path::new("/"));
    if let Some(found) = search_stage(env_dir)? {
        debug!("moonraker config found in env dir");
        return Ok(Some(found));
    }

    let data_root = env_dir.parent().unwrap_or(env_dir);
    let config_dir = data_root.join("config");
    if config_dir.exists() {
        if let Some(found) = search_stage(&config_dir)? {
            debug!("moonraker config found in config dir");
            return Ok(Some(found));
        }
    }

    if let Some(found) = search_stage(data_root)? {
        debug!("moonraker config found from printer data root");
        return Ok(Some(found));
    }

    Ok(None)
}

fn search_stage(root: &Path) -> Result<Option<PathBuf>> {
    match find_moonraker_config(root) {
        Ok(found) => Ok(found),
        // INVARIANT: Only the env file's directory structure matters, and it
        //   does not have to exist for the later stages to be tried.
        Err(err) if err.is_not_found() && !root.exists() => {
            debug!("search root {:?} does not exist", root.display());
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Service unit matching error types.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Service unit file cannot be read.
    #[error("failed to read service unit {:?}", path.display())]
    ReadUnit {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Config search around the environment file fails.
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Friendly result alias :3
type Result<T, E = ServiceError> = std::result::Result<T, E>;
