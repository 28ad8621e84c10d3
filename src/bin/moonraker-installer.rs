// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use moonraker_installer::{
    config::InstallerConfig,
    discovery::{prompt::ScriptedPrompt, Discovery, ResolutionContext},
    path::{default_service_dir, home_dir},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mkdirp::mkdirp;
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "moonraker-installer [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Show diagnostic output, including every file discovery looks at.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Discover(opts) => run_discover(opts),
            Command::List(opts) => run_list(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Settle on the Moonraker instance to install against.
    #[command(override_usage = "moonraker-installer discover [options]")]
    Discover(DiscoverOptions),

    /// List every Moonraker instance that could be found.
    #[command(override_usage = "moonraker-installer list [options]")]
    List(ListOptions),
}

#[derive(Args, Clone, Debug)]
struct SearchOptions {
    /// Installer settings file to start from.
    #[arg(long, value_name = "path")]
    pub settings: Option<PathBuf>,

    /// Path to a known moonraker.conf.
    #[arg(short = 'c', long, value_name = "path")]
    pub moonraker_config: Option<PathBuf>,

    /// Name of a known Moonraker service unit.
    #[arg(short, long, value_name = "name")]
    pub service_name: Option<String>,

    /// Home directory to list in diagnostic output.
    #[arg(long, value_name = "path")]
    pub home: Option<PathBuf>,

    /// Directory to search for Moonraker service units.
    #[arg(long, value_name = "path")]
    pub service_dir: Option<PathBuf>,

    /// Always ask which instance to use, even if only one exists.
    #[arg(long)]
    pub no_auto_select: bool,
}

impl SearchOptions {
    /// Merge command line options over the settings file.
    fn load(&self) -> Result<(InstallerConfig, PathBuf, ResolutionContext)> {
        let mut settings = match &self.settings {
            Some(path) => read_to_string(path)
                .with_context(|| format!("failed to read settings file {:?}", path.display()))?
                .parse::<InstallerConfig>()
                .with_context(|| format!("failed to parse settings file {:?}", path.display()))?,
            None => InstallerConfig::default(),
        };

        if let Some(config_path) = &self.moonraker_config {
            settings.moonraker.config_path = Some(config_path.clone());
        }
        if let Some(service_name) = &self.service_name {
            settings.moonraker.service_name = Some(service_name.clone());
        }
        if let Some(home) = &self.home {
            settings.discovery.home_dir = Some(home.clone());
        }
        if let Some(service_dir) = &self.service_dir {
            settings.discovery.service_dir = Some(service_dir.clone());
        }
        if self.no_auto_select {
            settings.discovery.disable_auto_select = true;
        }

        let service_dir = settings
            .discovery
            .service_dir
            .clone()
            .unwrap_or_else(default_service_dir);
        let home = match &settings.discovery.home_dir {
            Some(home) => home.clone(),
            None => home_dir()?,
        };
        let context = settings.to_context(home);

        Ok((settings, service_dir, context))
    }
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DiscoverOptions {
    #[command(flatten)]
    pub search: SearchOptions,

    /// Answer the instance selection prompt up front.
    #[arg(long, value_name = "number")]
    pub select: Option<String>,

    /// Write the resolved instance as a settings file.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    #[command(flatten)]
    pub search: SearchOptions,
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run_discover(opts: DiscoverOptions) -> Result<()> {
    let (mut settings, service_dir, mut context) = opts.search.load()?;

    let resolution = match opts.select {
        Some(answer) => {
            Discovery::new(service_dir, ScriptedPrompt::new([answer])).resolve(&context)?
        }
        None => Discovery::with_terminal(service_dir).resolve(&context)?,
    };
    info!(
        "using moonraker instance [{}] ({})",
        resolution.pair, resolution.method
    );

    context.apply(&resolution);
    settings.record(&context);
    match opts.output {
        Some(output) => {
            if let Some(parent) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                mkdirp(parent)
                    .with_context(|| format!("failed to create {:?}", parent.display()))?;
            }
            write(&output, settings.to_string())
                .with_context(|| format!("failed to write {:?}", output.display()))?;
            info!("wrote resolved instance to {:?}", output.display());
        }
        None => print!("{settings}"),
    }

    Ok(())
}

fn run_list(opts: ListOptions) -> Result<()> {
    let (_, service_dir, _) = opts.search.load()?;

    let pairs = Discovery::with_terminal(service_dir).enumerate()?;
    if pairs.is_empty() {
        warn!("no moonraker instances could be detected");
        return Ok(());
    }

    for (number, pair) in pairs.iter().enumerate() {
        info!(
            "  {} {} [{}]",
            number + 1,
            pair.service_file_name,
            pair.config_file_path.display()
        );
    }

    Ok(())
}
