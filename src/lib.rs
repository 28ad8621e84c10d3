// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Moonraker instance discovery for the OctoEverywhere installer.
//!
//! Before the OctoEverywhere plugin can be set up for a printer, the installer
//! has to know which Moonraker instance it is being set up for: the systemd
//! service that runs the instance, and the `moonraker.conf` that configures
//! it. This crate finds every such pair on the device and settles on one,
//! asking the operator when the answer is not obvious.
//!
//! # See Also
//!
//! 1. [`discovery`]
//! 2. [`config`]

pub mod config;
pub mod discovery;
pub mod path;

pub use config::InstallerConfig;
pub use discovery::{
    Discovery, DiscoveryError, Resolution, ResolutionContext, ResolveMethod, ServiceConfigPair,
};
