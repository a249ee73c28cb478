use super::super::null::Command;
use super::*;
use crate::foundation::math::Vec3;

#[test]
fn test_translucent_draws_come_after_opaque_and_skybox() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    let eye = Transform::from_position(Vec3::new(0.0, 0.0, 3.0));
    backend.clear_commands();

    backend.begin().unwrap();
    backend.begin_depth_pass(scene.viewport, &eye, &Camera::default()).unwrap();
    backend.draw_depth(&Transform::identity(), &scene.opaque, 0).unwrap();
    backend.draw_depth(&Transform::identity(), &scene.translucent, 0).unwrap();
    backend.end_depth_pass().unwrap();

    backend.begin_forward_pass().unwrap();
    backend.draw_forward(&Transform::identity(), &scene.translucent, 0).unwrap();
    backend.draw_forward(&Transform::identity(), &scene.opaque, 0).unwrap();
    backend.draw_skybox().unwrap();
    backend.draw_forward(&Transform::identity(), &scene.translucent, 0).unwrap();
    backend.draw_forward(&Transform::identity(), &scene.opaque, 0).unwrap();
    backend.end_forward_pass().unwrap();
    backend.end().unwrap();

    let forward: Vec<&Command> = backend
        .commands()
        .iter()
        .skip_while(|c| **c != Command::BeginForward)
        .take_while(|c| **c != Command::EndForward)
        .filter(|c| matches!(c, Command::DrawForward { .. } | Command::Skybox { .. }))
        .collect();
    assert_eq!(forward.len(), 5);

    let first_translucent = forward
        .iter()
        .position(|c| matches!(c, Command::DrawForward { translucent: true, .. }))
        .unwrap();
    assert_eq!(first_translucent, 3);
    assert!(forward[..3].iter().all(|c| !matches!(c, Command::DrawForward { translucent: true, .. })));
    assert!(forward[3..].iter().all(|c| matches!(c, Command::DrawForward { translucent: true, .. })));

    // translucent materials never reach the gbuffer
    let depth_draws = backend
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::DrawDepth { .. }))
        .count();
    assert_eq!(depth_draws, 1);
}
