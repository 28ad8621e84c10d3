// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Moonraker instance discovery.
//!
//! Figuring out which Moonraker instance to install against is the hardest
//! part of the whole install. A device may run any number of Moonraker
//! instances, each with its own systemd service unit and its own
//! `moonraker.conf`, and nothing in a service unit points at the config
//! directly. On top of that, every Klipper distribution lays out its data
//! directories a little differently.
//!
//! # Discovery Flow
//!
//! 1. If the caller already knows an existing config path and service name,
//!    there is nothing to do.
//! 2. Otherwise every `moonraker*.service` unit under the service directory is
//!    paired with a config through [`match_config_for_service`]. Units that
//!    cannot be paired are dropped.
//! 3. A known config path that matches one of the pairs selects that pair.
//!    One that matches nothing is only advisory, and discovery carries on as
//!    if it was never given.
//! 4. A lone pair is selected automatically, unless the caller disabled that.
//! 5. Otherwise the operator picks from a numbered list.
//!
//! # See Also
//!
//! 1. [`search`]
//! 2. [`service`]

pub mod prompt;
pub mod search;
pub mod service;

use crate::discovery::{
    prompt::{InquirePrompt, InstancePrompt, PromptError},
    search::{find_files, log_matching_paths, SearchError},
    service::match_config_for_service,
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, enabled, info, instrument, warn, Level};

/// Where operators can get help when discovery gets stuck.
pub const SUPPORT_URL: &str = "https://octoeverywhere.com/support";

/// A Moonraker service unit matched to its config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceConfigPair {
    /// Base name of the service unit, e.g. "moonraker-2.service".
    pub service_file_name: String,

    /// Absolute path to the matched Moonraker config.
    pub config_file_path: PathBuf,
}

impl ServiceConfigPair {
    /// Construct new service config pair.
    pub fn new(service_file_name: impl Into<String>, config_file_path: impl Into<PathBuf>) -> Self {
        Self {
            service_file_name: service_file_name.into(),
            config_file_path: config_file_path.into(),
        }
    }
}

impl Display for ServiceConfigPair {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{}:{}",
            self.service_file_name,
            self.config_file_path.display()
        )
    }
}

/// Caller state that discovery starts from.
///
/// Discovery never writes to the context. Merge a finished [`Resolution`]
/// back in through [`ResolutionContext::apply`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    /// Previously known Moonraker config path.
    pub config_path: Option<PathBuf>,

    /// Previously known Moonraker service name.
    pub service_name: Option<String>,

    /// Home directory listed in diagnostic output.
    pub home_dir: PathBuf,

    /// Always ask the operator, even if only one instance exists.
    pub disable_auto_select: bool,
}

impl ResolutionContext {
    /// Construct new resolution context without any hints.
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            ..Default::default()
        }
    }

    /// Pair named by the context, if it names an existing config and a
    /// non-empty service name.
    pub fn provided_pair(&self) -> Option<ServiceConfigPair> {
        let config = self.config_path.as_deref().filter(|path| path.exists())?;
        let service = self.service_name.as_deref().filter(|name| !name.is_empty())?;

        Some(ServiceConfigPair::new(service, config))
    }

    /// Merge a finished resolution into the context.
    pub fn apply(&mut self, resolution: &Resolution) {
        self.config_path = Some(resolution.pair.config_file_path.clone());
        self.service_name = Some(resolution.pair.service_file_name.clone());
    }
}

/// How a [`Resolution`] was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMethod {
    /// Caller already supplied a valid config and service name.
    Provided,

    /// Caller's config path matched a discovered instance.
    HintMatched,

    /// Only one instance exists, so it was picked.
    AutoSelected,

    /// Operator picked from the list of instances.
    UserSelected,
}

impl Display for ResolveMethod {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let method = match self {
            Self::Provided => "provided",
            Self::HintMatched => "matched given config",
            Self::AutoSelected => "only instance found",
            Self::UserSelected => "selected by user",
        };
        fmt.write_str(method)
    }
}

/// Final answer of discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Instance that was settled on.
    pub pair: ServiceConfigPair,

    /// How it was settled on.
    pub method: ResolveMethod,
}

impl Resolution {
    fn new(pair: ServiceConfigPair, method: ResolveMethod) -> Self {
        Self { pair, method }
    }
}

/// Moonraker instance discovery engine.
///
/// Searches a systemd service directory for Moonraker units, pairs them with
/// their configs, and settles on one of them. Operator input goes through
/// the [`InstancePrompt`] it is built with.
#[derive(Debug)]
pub struct Discovery<P = InquirePrompt>
where
    P: InstancePrompt,
{
    service_dir: PathBuf,
    prompt: P,
}

impl Discovery<InquirePrompt> {
    /// Construct new discovery engine that prompts on the terminal.
    pub fn with_terminal(service_dir: impl Into<PathBuf>) -> Self {
        Self::new(service_dir, InquirePrompt::new())
    }
}

impl<P> Discovery<P>
where
    P: InstancePrompt,
{
    /// Construct new discovery engine.
    pub fn new(service_dir: impl Into<PathBuf>, prompt: P) -> Self {
        Self {
            service_dir: service_dir.into(),
            prompt,
        }
    }

    /// Service directory being searched.
    pub fn service_dir(&self) -> &Path {
        self.service_dir.as_path()
    }

    /// Prompt used for operator input.
    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Settle on one Moonraker instance.
    ///
    /// A context that already names an existing config and a non-empty
    /// service name is returned as is, without touching the filesystem.
    /// Everything else goes through full enumeration, see the
    /// [module documentation](self) for the order of the remaining steps.
    ///
    /// # Errors
    ///
    /// - Return [`DiscoveryError::NoInstancesFound`] if no service unit could
    ///   be paired with a config.
    /// - Return [`DiscoveryError::ServiceDir`] if the service directory cannot
    ///   be read.
    /// - Return [`DiscoveryError::Prompt`] if operator input cannot be read.
    #[instrument(skip(self, context), level = "debug")]
    pub fn resolve(&mut self, context: &ResolutionContext) -> Result<Resolution> {
        debug!("start discovery");

        if let Some(pair) = context.provided_pair() {
            info!("given a valid moonraker config and service name [{pair}]");
            return Ok(Resolution::new(pair, ResolveMethod::Provided));
        }

        if enabled!(Level::DEBUG) {
            self.log_debug_paths(&context.home_dir);
        }

        let pairs = self.enumerate()?;
        if pairs.is_empty() {
            return Err(DiscoveryError::NoInstancesFound {
                service_dir: self.service_dir.clone(),
            });
        }

        if let Some(hint) = &context.config_path {
            if let Some(pair) = pairs.iter().find(|pair| &pair.config_file_path == hint) {
                info!("given moonraker config was found with a service file pair [{pair}]");
                return Ok(Resolution::new(pair.clone(), ResolveMethod::HintMatched));
            }
            warn!(
                "moonraker config path {:?} was given, but no found pair matched it",
                hint.display()
            );
        }

        if pairs.len() == 1 && !context.disable_auto_select {
            let pair = pairs[0].clone();
            info!("only one moonraker instance was found, so we are using it [{pair}]");
            return Ok(Resolution::new(pair, ResolveMethod::AutoSelected));
        }

        let index = self.select(&pairs)?;
        let pair = pairs[index].clone();
        info!("moonraker instance selected [{pair}]");

        Ok(Resolution::new(pair, ResolveMethod::UserSelected))
    }

    /// List every Moonraker service unit that could be paired with a config.
    ///
    /// Pairs come out in the order the service units were found, i.e., sorted
    /// by name at each directory level. Units without a config are logged
    /// along with their contents and left out.
    ///
    /// # Errors
    ///
    /// - Return [`DiscoveryError::ServiceDir`] if the service directory exists
    ///   but cannot be read.
    #[instrument(skip(self), level = "debug")]
    pub fn enumerate(&self) -> Result<Vec<ServiceConfigPair>> {
        // Simple installs only have "moonraker.service". Multi-instance installs
        // follow the KIAUH naming of "moonraker-<name or number>.service".
        let service_files = match find_files(&self.service_dir, "moonraker", ".service") {
            Ok(files) => files,
            Err(err) if err.is_not_found() => {
                warn!(
                    "service directory {:?} does not exist",
                    self.service_dir.display()
                );
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        let mut pairs = Vec::new();
        for service_file in service_files {
            let Some(config) = match_config_for_service(&service_file) else {
                debug!(
                    "moonraker config file not found for service file {:?}",
                    service_file.display()
                );
                log_service_file(&service_file);
                continue;
            };

            debug!(
                "moonraker service {:?} matched to {:?}",
                service_file.display(),
                config.display()
            );
            let name = service_file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            pairs.push(ServiceConfigPair::new(name, config));
        }

        Ok(pairs)
    }

    fn select(&mut self, pairs: &[ServiceConfigPair]) -> Result<usize> {
        warn!("multiple moonraker instances found");
        warn!(
            "an instance of OctoEverywhere must be installed for every moonraker instance, so this installer must be run for each instance individually"
        );
        for (number, pair) in pairs.iter().enumerate() {
            info!(
                "  {} {} [{}]",
                number + 1,
                pair.service_file_name,
                pair.config_file_path.display()
            );
        }

        let mut first_attempt = true;
        loop {
            if !first_attempt {
                warn!("if you need help, contact us! {SUPPORT_URL}");
            }
            first_attempt = false;

            let answer = self
                .prompt
                .ask("Enter the number for the config you would like to setup now:")?;
            match parse_selection(&answer, pairs.len()) {
                Ok(index) => return Ok(index),
                Err(reason) => warn!("{reason}"),
            }
        }
    }

    fn log_debug_paths(&self, home_dir: &Path) {
        debug!("discovery - service files");
        log_matching_paths(&self.service_dir, ".service");

        debug!("discovery - config files in home path");
        log_matching_paths(home_dir, ".conf");
    }
}

/// Turn an operator's answer into a zero-based index into `count` items.
///
/// Answers are one-based, and surrounding whitespace is ignored.
fn parse_selection(answer: &str, count: usize) -> std::result::Result<usize, String> {
    let number = answer
        .trim()
        .parse::<i64>()
        .map_err(|err| format!("invalid input, try again: {err}"))?;

    match usize::try_from(number) {
        Ok(number) if (1..=count).contains(&number) => Ok(number - 1),
        _ => Err("invalid number selection, try again".into()),
    }
}

fn log_service_file(service_file: &Path) {
    // Unreadable units were already reported during config matching.
    if let Ok(contents) = read_to_string(service_file) {
        for line in contents.lines() {
            debug!("{line}");
        }
    }
}

/// Discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// No Moonraker instance can be paired with a config.
    #[error(
        "no moonraker instances could be detected on this device under {:?}, install moonraker \
         first or pass the path to its config with --moonraker-config",
        service_dir.display()
    )]
    NoInstancesFound { service_dir: PathBuf },

    /// Service directory exists but cannot be read.
    #[error(transparent)]
    ServiceDir(#[from] SearchError),

    /// Operator input cannot be read.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Friendly result alias :3
pub type Result<T, E = DiscoveryError> = std::result::Result<T, E>;
