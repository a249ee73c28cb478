use super::super::bake::BakeTarget;
use super::super::null::Command;
use super::*;

#[test]
fn test_environment_bake_runs_42_draws() {
    let mut backend = backend();
    let skybox = cube_texture(&mut backend, 256);
    backend.clear_commands();

    let environment = backend.make_environment(&EnvironmentDesc { skybox }).unwrap();

    let draws: Vec<_> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::BakeDraw(step) => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(draws.len(), 42);
    assert_eq!(draws.iter().filter(|s| s.target == BakeTarget::Irradiance).count(), 6);
    assert!(draws[..6].iter().all(|s| s.target == BakeTarget::Irradiance));

    // every draw is its own submission
    let commands = backend.commands();
    let submits = commands.iter().filter(|c| matches!(c, Command::BakeSubmit)).count();
    assert_eq!(submits, 42);
    assert!(commands
        .chunks(2)
        .all(|pair| matches!(pair, [Command::BakeDraw(_), Command::BakeSubmit])));

    let maps = backend.environment(environment).unwrap();
    assert_eq!((maps.irradiance.width, maps.irradiance.height), (64, 64));
    assert_eq!(maps.irradiance.kind, TextureKind::Cube);
    assert_eq!(maps.irradiance.kind.layers(), 6);
    assert_eq!(maps.prefilter.width, 128);
    assert_eq!(maps.prefilter.mip_levels, 6);
    assert_eq!(maps.skybox, skybox);
}

#[test]
fn test_environment_needs_a_cubemap() {
    let mut backend = backend();
    let flat = backend.make_texture(&TextureDesc::new(16, 16, PixelFormat::Rgba8)).unwrap();
    assert!(matches!(
        backend.make_environment(&EnvironmentDesc { skybox: flat }),
        Err(RenderError::NotACubemap)
    ));
}

#[test]
fn test_brdf_lut_is_baked_once_at_creation() {
    let backend = backend();
    assert_eq!(backend.commands(), &[Command::BakeBrdfLut { size: 512 }]);
}

#[test]
fn test_backend_rejects_config_without_prefilter_mips() {
    let mut config = RendererConfig::default();
    config.ibl.prefilter_mips = 0;
    assert!(matches!(NullBackend::new(config), Err(RenderError::Config(_))));
}
