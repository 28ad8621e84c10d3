// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::DeviceFixture;

use anyhow::Result;
use moonraker_installer::{
    discovery::prompt::ScriptedPrompt, Discovery, DiscoveryError, InstallerConfig,
    ResolutionContext, ResolveMethod, ServiceConfigPair,
};
use pretty_assertions::assert_eq;

#[test]
fn resolve_standard_printer_data_layout() -> Result<()> {
    let device = DeviceFixture::new()?;
    let config = device.add_home_file("printer_data/config/moonraker.conf")?;
    device.add_home_file("printer_data/config/backup/moonraker.conf")?;
    device.add_home_file("printer_data/config/moonraker.conf.backup")?;
    device.add_service(
        "moonraker.service",
        device.home().join("printer_data/systemd/moonraker.env"),
    )?;

    let mut discovery = Discovery::new(device.service_dir(), ScriptedPrompt::default());
    let resolution = discovery.resolve(&ResolutionContext::new(device.home()))?;

    assert_eq!(
        resolution.pair,
        ServiceConfigPair::new("moonraker.service", config)
    );
    assert_eq!(resolution.method, ResolveMethod::AutoSelected);
    assert_eq!(discovery.prompt().asked(), 0);

    Ok(())
}

#[test]
fn resolve_ratos_image_ignores_vendor_config() -> Result<()> {
    let device = DeviceFixture::new()?;
    device.add_home_file("printer_data/config/RatOS/moonraker.conf")?;
    let config = device.add_home_file("printer_data/config/moonraker.conf")?;
    device.add_service(
        "moonraker.service",
        device.home().join("printer_data/systemd/moonraker.env"),
    )?;

    let pairs = Discovery::new(device.service_dir(), ScriptedPrompt::default()).enumerate()?;
    assert_eq!(pairs, vec![ServiceConfigPair::new("moonraker.service", config)]);

    Ok(())
}

#[test]
fn resolve_kiauh_multi_instance_by_selection() -> Result<()> {
    let device = DeviceFixture::new()?;
    let first = device.add_home_file("printer_1_data/config/moonraker.conf")?;
    let second = device.add_home_file("printer_2_data/config/moonraker.conf")?;
    device.add_service(
        "moonraker-2.service",
        device.home().join("printer_2_data/systemd/moonraker.env"),
    )?;
    device.add_service(
        "moonraker.service",
        device.home().join("printer_1_data/systemd/moonraker.env"),
    )?;
    device.add_service(
        "moonraker-broken.service",
        device.home().join("nowhere/systemd/moonraker.env"),
    )?;

    let mut discovery = Discovery::new(device.service_dir(), ScriptedPrompt::new(["9", "2"]));
    let pairs = discovery.enumerate()?;
    assert_eq!(
        pairs,
        vec![
            ServiceConfigPair::new("moonraker-2.service", second.clone()),
            ServiceConfigPair::new("moonraker.service", first),
        ]
    );

    let resolution = discovery.resolve(&ResolutionContext::new(device.home()))?;
    assert_eq!(resolution.pair, pairs[1]);
    assert_eq!(resolution.method, ResolveMethod::UserSelected);
    assert_eq!(discovery.prompt().asked(), 2);

    Ok(())
}

#[test]
fn resolve_first_menu_entry_is_dashed_service_name() -> Result<()> {
    let device = DeviceFixture::new()?;
    device.add_home_file("printer_data/config/moonraker.conf")?;
    let second = device.add_home_file("printer_2_data/config/moonraker.conf")?;
    device.add_service(
        "moonraker.service",
        device.home().join("printer_data/systemd/moonraker.env"),
    )?;
    device.add_service(
        "moonraker-2.service",
        device.home().join("printer_2_data/systemd/moonraker.env"),
    )?;

    let resolution = Discovery::new(device.service_dir(), ScriptedPrompt::new(["1"]))
        .resolve(&ResolutionContext::new(device.home()))?;
    assert_eq!(
        resolution.pair,
        ServiceConfigPair::new("moonraker-2.service", second)
    );

    Ok(())
}

#[test]
fn resolve_without_services_is_fatal() -> Result<()> {
    let device = DeviceFixture::new()?;
    device.add_home_file("printer_data/config/moonraker.conf")?;

    let result = Discovery::new(device.service_dir(), ScriptedPrompt::default())
        .resolve(&ResolutionContext::new(device.home()));

    let err = result.unwrap_err();
    assert!(matches!(err, DiscoveryError::NoInstancesFound { .. }));
    assert!(err.to_string().contains("--moonraker-config"));

    Ok(())
}

#[test]
fn exhausted_prompt_aborts_selection() -> Result<()> {
    let device = DeviceFixture::new()?;
    for data in ["printer_1_data", "printer_2_data"] {
        device.add_home_file(format!("{data}/config/moonraker.conf"))?;
        device.add_service(
            &format!("moonraker-{data}.service"),
            device.home().join(format!("{data}/systemd/moonraker.env")),
        )?;
    }

    let result = Discovery::new(device.service_dir(), ScriptedPrompt::new(["nope"]))
        .resolve(&ResolutionContext::new(device.home()));

    assert!(matches!(result, Err(DiscoveryError::Prompt(_))));

    Ok(())
}

#[test]
fn recorded_settings_resolve_without_scanning() -> Result<()> {
    let device = DeviceFixture::new()?;
    device.add_home_file("printer_data/config/moonraker.conf")?;
    device.add_service(
        "moonraker.service",
        device.home().join("printer_data/systemd/moonraker.env"),
    )?;

    let mut discovery = Discovery::new(device.service_dir(), ScriptedPrompt::default());
    let mut context = ResolutionContext::new(device.home());
    let first = discovery.resolve(&context)?;
    context.apply(&first);
    let mut settings = InstallerConfig::default();
    settings.record(&context);
    let settings: InstallerConfig = settings.to_string().parse()?;

    // Service directory is gone, so a rerun can only succeed without scanning.
    std::fs::remove_dir_all(device.service_dir())?;
    let second = discovery.resolve(&settings.to_context(device.home()))?;

    assert_eq!(second.pair, first.pair);
    assert_eq!(second.method, ResolveMethod::Provided);

    Ok(())
}
