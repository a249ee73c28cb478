use super::*;

#[test]
fn test_update_of_immutable_texture_fails() {
    let mut backend = backend();
    let texture = backend.make_texture(&TextureDesc::new(4, 4, PixelFormat::Rgba8)).unwrap();
    let result = backend.update_texture(texture, &[0; 64], TextureRegion::new(0, 0, 4, 4));
    assert!(matches!(result, Err(RenderError::TextureNotMutable)));
}

#[test]
fn test_update_larger_than_texture_fails() {
    let mut backend = backend();
    let texture = backend
        .make_texture(&TextureDesc::new(4, 4, PixelFormat::Rgba8).mutable())
        .unwrap();
    let result = backend.update_texture(texture, &[0; 65], TextureRegion::new(0, 0, 4, 4));
    assert!(matches!(result, Err(RenderError::TextureUpdateOverflow { requested: 65, capacity: 64 })));
    backend
        .update_texture(texture, &[0; 16], TextureRegion::new(1, 1, 2, 2))
        .unwrap();
}

#[test]
fn test_material_needs_live_textures() {
    let mut backend = backend();
    let texture = backend.make_texture(&TextureDesc::solid_color(1, 1, [255; 4])).unwrap();
    backend.destroy_texture(texture).unwrap();
    let desc = MaterialDesc {
        maps: MaterialMaps {
            albedo: Some(texture),
            ..MaterialMaps::default()
        },
        ..MaterialDesc::default()
    };
    assert!(matches!(
        backend.make_material(&desc),
        Err(RenderError::ResourceNotFound { kind: "texture" })
    ));
}

#[test]
fn test_invalid_mesh_is_rejected() {
    let mut backend = backend();
    let mut mesh = triangle();
    mesh.indices[2] = 9;
    assert!(matches!(backend.make_mesh(&mesh), Err(RenderError::InvalidMesh(_))));
}

#[test]
fn test_destroyed_resources_wait_for_their_frame() {
    let mut backend = backend();
    let scene = fixture(&mut backend);

    backend.begin().unwrap();
    backend.end().unwrap();
    backend.destroy_mesh(scene.opaque.mesh).unwrap();
    assert_eq!(backend.retired_count(), 1);
    assert!(backend.mesh_lod_count(scene.opaque.mesh).is_err());

    // the frame that could use the mesh was slot 0; it is collected when slot 0 comes around
    backend.begin().unwrap();
    backend.end().unwrap();
    backend.begin().unwrap();
    backend.end().unwrap();
    assert_eq!(backend.retired_count(), 1);
    backend.begin().unwrap();
    assert_eq!(backend.retired_count(), 0);
    backend.end().unwrap();
}

#[test]
fn test_flush_drops_everything_retired() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    backend.destroy_material(scene.translucent.material).unwrap();
    backend.destroy_viewport(scene.viewport).unwrap();
    assert_eq!(backend.retired_count(), 2);
    backend.flush().unwrap();
    assert_eq!(backend.retired_count(), 0);
}

#[test]
fn test_flush_is_rejected_while_recording() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    backend.begin().unwrap();
    backend.destroy_material(scene.translucent.material).unwrap();
    assert!(matches!(
        backend.flush(),
        Err(RenderError::InvalidPassTransition { .. })
    ));
    // the frame is untouched and its retired material survives
    assert_eq!(backend.retired_count(), 1);
    backend.end().unwrap();
    backend.flush().unwrap();
    assert_eq!(backend.retired_count(), 0);
}

#[test]
fn test_stale_handles_are_reported() {
    let mut backend = backend();
    let scene = fixture(&mut backend);
    backend.destroy_material(scene.opaque.material).unwrap();
    assert!(backend.destroy_material(scene.opaque.material).is_err());

    let eye = Transform::identity();
    backend.begin().unwrap();
    backend.begin_depth_pass(scene.viewport, &eye, &Camera::default()).unwrap();
    assert!(matches!(
        backend.draw_depth(&Transform::identity(), &scene.opaque, 0),
        Err(RenderError::ResourceNotFound { kind: "material" })
    ));
    backend.end_depth_pass().unwrap();
    backend.end().unwrap();
}
