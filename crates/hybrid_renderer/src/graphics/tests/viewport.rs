use super::*;

#[test]
fn test_recreated_viewport_matches_new_size() {
    let mut backend = backend();
    let viewport = backend.make_viewport(&ViewportDesc::new(800, 600)).unwrap();
    assert_eq!(backend.viewport_size(viewport).unwrap(), (800, 600));

    backend.destroy_viewport(viewport).unwrap();
    let resized = backend.make_viewport(&ViewportDesc::new(1024, 768)).unwrap();

    let layout = backend.viewport_layout(resized).unwrap();
    assert!(!layout.targets().is_empty());
    for target in layout.targets() {
        assert_eq!((target.width, target.height), (1024, 768), "{:?}", target.role);
    }
    assert!(matches!(
        backend.viewport_size(viewport),
        Err(RenderError::ResourceNotFound { kind: "viewport" })
    ));
}

#[test]
fn test_zero_sized_viewport_is_rejected() {
    let mut backend = backend();
    assert!(matches!(
        backend.make_viewport(&ViewportDesc::new(0, 600)),
        Err(RenderError::InvalidViewport { width: 0, height: 600 })
    ));
}
