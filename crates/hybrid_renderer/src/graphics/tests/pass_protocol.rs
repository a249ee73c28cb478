use super::super::null::Command;
use super::super::postprocess::PostSource;
use super::*;
use crate::foundation::math::Vec3;

fn camera() -> (Transform, Camera) {
    (
        Transform::looking_at(Vec3::new(0.0, 1.0, 5.0), Vec3::zeros(), Vec3::y()),
        Camera::default(),
    )
}

fn kinds(commands: &[Command]) -> Vec<&'static str> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::BeginDepth { .. } => Some("depth"),
            Command::BeginShadow { .. } => Some("shadow"),
            Command::BeginLight => Some("light"),
            Command::BeginForward => Some("forward"),
            Command::BeginPostprocess => Some("post"),
            Command::Tonemap { .. } => Some("tonemap"),
            Command::Submit { .. } => Some("submit"),
            Command::Present { .. } => Some("present"),
            _ => None,
        })
        .collect()
}

#[test]
fn test_full_frame_runs_every_pass_in_order() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    let (eye, cam) = camera();
    let sun = Transform::looking_at(Vec3::new(0.0, 10.0, 0.0), Vec3::new(1.0, 0.0, 1.0), Vec3::y());
    let light = Light {
        shadow_enabled: true,
        ..Light::default()
    };
    backend.clear_commands();

    backend.begin().unwrap();
    backend.begin_depth_pass(scene.viewport, &eye, &cam).unwrap();
    backend.draw_depth(&Transform::identity(), &scene.opaque, 0).unwrap();
    backend.end_depth_pass().unwrap();
    for cascade in 0..4 {
        backend.begin_shadow_pass(&sun, &light, &DirectionalLight, cascade).unwrap();
        backend.draw_shadow(&Transform::identity(), &scene.opaque, 0).unwrap();
        backend.end_shadow_pass().unwrap();
    }
    backend.begin_light_pass().unwrap();
    backend.add_directional_light(&sun, &light, &DirectionalLight).unwrap();
    backend
        .add_point_light(&Transform::identity(), &Light::default(), &PointLight::default())
        .unwrap();
    backend.end_light_pass().unwrap();
    backend.begin_forward_pass().unwrap();
    backend.draw_skybox().unwrap();
    backend.draw_forward(&Transform::identity(), &scene.opaque, 0).unwrap();
    backend.end_forward_pass().unwrap();
    backend.begin_postprocess_pass().unwrap();
    backend.next_postprocess_pass().unwrap();
    backend.draw_fxaa().unwrap();
    backend.end_postprocess_pass().unwrap();
    backend.end().unwrap();
    backend.present(scene.viewport).unwrap();

    assert_eq!(
        kinds(backend.commands()),
        vec![
            "depth", "shadow", "shadow", "shadow", "shadow", "light", "forward", "post", "tonemap", "submit",
            "present"
        ]
    );
    assert_eq!(backend.shadow_uniform().cascade_count(), 4);
    assert_eq!(backend.light_uniform().directional_count(), 1);
    assert_eq!(backend.light_uniform().point_count(), 1);
    assert!(backend.commands().contains(&Command::EndLight {
        point_lights: 1,
        directional_lights: 1
    }));
}

#[test]
fn test_depth_then_forward_fills_in_the_light_pass() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    let (eye, cam) = camera();
    backend.clear_commands();

    backend.begin().unwrap();
    backend.begin_depth_pass(scene.viewport, &eye, &cam).unwrap();
    backend.end_depth_pass().unwrap();
    backend.begin_forward_pass().unwrap();
    backend.end_forward_pass().unwrap();
    backend.end().unwrap();

    assert_eq!(
        kinds(backend.commands()),
        vec!["depth", "light", "forward", "post", "tonemap", "submit"]
    );
}

#[test]
fn test_out_of_order_calls_are_rejected() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    let (eye, cam) = camera();

    assert!(matches!(
        backend.begin_depth_pass(scene.viewport, &eye, &cam),
        Err(RenderError::InvalidPassTransition { .. })
    ));

    backend.begin().unwrap();
    assert!(backend.begin().is_err(), "nested begin");
    assert!(backend.begin_light_pass().is_err(), "light before any view");
    backend.begin_depth_pass(scene.viewport, &eye, &cam).unwrap();
    assert!(matches!(
        backend.draw_forward(&Transform::identity(), &scene.opaque, 0),
        Err(RenderError::DrawOutsidePass {
            expected: PassKind::Forward,
            ..
        })
    ));
    assert!(backend.end().is_err(), "end inside a pass");
    backend.end_depth_pass().unwrap();

    backend.begin_light_pass().unwrap();
    backend.end_light_pass().unwrap();
    assert!(
        backend.begin_shadow_pass(&Transform::identity(), &Light::default(), &DirectionalLight, 0).is_err(),
        "shadow after light"
    );
    backend.end().unwrap();
}

#[test]
fn test_shadow_cascade_count_matches_cascades_rendered() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    let (eye, cam) = camera();
    let sun = Transform::looking_at(Vec3::new(0.0, 10.0, 0.0), Vec3::zeros(), Vec3::x());
    let light = Light {
        shadow_enabled: true,
        ..Light::default()
    };

    backend.begin().unwrap();
    backend.begin_depth_pass(scene.viewport, &eye, &cam).unwrap();
    backend.end_depth_pass().unwrap();
    assert!(matches!(
        backend.begin_shadow_pass(&sun, &light, &DirectionalLight, 3),
        Err(RenderError::CascadeOutOfOrder { cascade: 3, expected: 0 })
    ));
    assert_eq!(backend.shadow_uniform().cascade_count(), 0);

    backend.begin_shadow_pass(&sun, &light, &DirectionalLight, 0).unwrap();
    backend.end_shadow_pass().unwrap();
    assert_eq!(backend.shadow_uniform().cascade_count(), 1);
    backend.end().unwrap();
}

#[test]
fn test_second_view_in_one_frame() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    let second = backend.make_viewport(&ViewportDesc::new(64, 64)).unwrap();
    let (eye, cam) = camera();
    backend.clear_commands();

    backend.begin().unwrap();
    backend.begin_depth_pass(scene.viewport, &eye, &cam).unwrap();
    backend.end_depth_pass().unwrap();
    backend.begin_depth_pass(second, &eye, &cam).unwrap();
    backend.end_depth_pass().unwrap();
    backend.end().unwrap();

    assert_eq!(backend.tracker().views(), 2);
    assert_eq!(
        kinds(backend.commands()),
        vec![
            "depth", "light", "forward", "post", "tonemap", "depth", "light", "forward", "post", "tonemap",
            "submit"
        ]
    );
}

#[test]
fn test_postprocess_ping_pong() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    let (eye, cam) = camera();
    backend.clear_commands();

    backend.begin().unwrap();
    backend.begin_depth_pass(scene.viewport, &eye, &cam).unwrap();
    backend.end_depth_pass().unwrap();
    backend.begin_postprocess_pass().unwrap();
    assert!(backend.draw_blur(2.0).is_err(), "effect without a step");
    backend.next_postprocess_pass().unwrap();
    backend.draw_blur(2.0).unwrap();
    backend.next_postprocess_pass().unwrap();
    backend.draw_sharpen(0.5).unwrap();
    backend.next_postprocess_pass().unwrap();
    backend.draw_outline(Vec3::new(1.0, 0.0, 0.0), 1.0).unwrap();
    backend.end_postprocess_pass().unwrap();
    backend.end().unwrap();

    let steps: Vec<_> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::Effect { read, write, .. } => Some((*read, *write)),
            _ => None,
        })
        .collect();
    assert_eq!(
        steps,
        vec![(PostSource::Forward, 0), (PostSource::Post(0), 1), (PostSource::Post(1), 0)]
    );
    assert!(backend.commands().contains(&Command::Tonemap {
        source: PostSource::Post(0)
    }));
}

#[test]
fn test_present_needs_a_finished_frame() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    assert!(matches!(backend.present(scene.viewport), Err(RenderError::NothingToPresent(_))));

    backend.begin().unwrap();
    assert!(backend.present(scene.viewport).is_err());
    backend.end().unwrap();
    backend.present(scene.viewport).unwrap();
    assert!(backend.present(scene.viewport).is_err(), "one present per frame");
}

#[test]
fn test_lod_is_clamped_to_available_levels() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    let (eye, cam) = camera();

    backend.begin().unwrap();
    backend.begin_depth_pass(scene.viewport, &eye, &cam).unwrap();
    backend.draw_depth(&Transform::identity(), &scene.opaque, 7).unwrap();
    backend.end_depth_pass().unwrap();
    backend.end().unwrap();

    assert!(backend.commands().iter().any(|c| matches!(c, Command::DrawDepth { lod: 0, .. })));
}
