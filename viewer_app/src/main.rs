//! Hybrid renderer viewer
//!
//! Opens a window, builds a small procedural scene and renders it through
//! the Vulkan backend. Settings come from `viewer.toml` next to the working
//! directory when present. Keys 1 to 5 toggle postprocess effects.

mod scene;
mod window;

use glfw::{Action, Key, WindowEvent};
use hybrid_renderer::assets::FormatError;
use hybrid_renderer::config::{Config, ConfigError};
use hybrid_renderer::core::config::RendererConfig;
use hybrid_renderer::foundation::math::Vec3;
use hybrid_renderer::graphics::{GraphicsBackend, RenderError, ViewportHandle};
use hybrid_renderer::render::backends::vulkan::{NativeWindow, VulkanBackend};
use hybrid_renderer::scene::{render_frame, PostEffect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scene::{ensure_viewport, DemoScene};
use window::{Window, WindowError};

const CONFIG_PATH: &str = "viewer.toml";

/// Errors that end the viewer
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Asset error: {0}")]
    Format(#[from] FormatError),
}

/// Viewer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// OBJ file shown next to the procedural meshes
    pub model: Option<String>,
    pub renderer: RendererConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Hybrid Renderer Viewer".to_string(),
            width: 1280,
            height: 720,
            model: None,
            renderer: RendererConfig::new("Hybrid Renderer Viewer"),
        }
    }
}

impl Config for ViewerConfig {}

/// Postprocess steps with an on/off switch each
struct EffectToggles {
    enabled: [bool; 5],
}

impl EffectToggles {
    fn new() -> Self {
        Self {
            enabled: [true, false, false, false, false],
        }
    }

    fn toggle(&mut self, index: usize) {
        if let Some(enabled) = self.enabled.get_mut(index) {
            *enabled = !*enabled;
            log::info!("Effect {} {}", index + 1, if *enabled { "on" } else { "off" });
        }
    }

    fn effects(&self) -> Vec<PostEffect> {
        let all = [
            PostEffect::Fxaa,
            PostEffect::Sharpen(0.3),
            PostEffect::MotionBlur(1.0),
            PostEffect::Blur(4.0),
            PostEffect::Outline(Vec3::new(0.05, 0.05, 0.05), 1.5),
        ];
        all.into_iter()
            .zip(self.enabled)
            .filter_map(|(effect, enabled)| enabled.then_some(effect))
            .collect()
    }
}

fn effect_index(key: Key) -> Option<usize> {
    match key {
        Key::Num1 => Some(0),
        Key::Num2 => Some(1),
        Key::Num3 => Some(2),
        Key::Num4 => Some(3),
        Key::Num5 => Some(4),
        _ => None,
    }
}

fn run(config: ViewerConfig) -> Result<(), ViewerError> {
    let mut window = Window::new(&config.title, config.width, config.height)?;
    let mut backend = VulkanBackend::new(&mut window, config.renderer.clone())?;
    let demo = DemoScene::create(&mut backend, config.model.as_deref())?;

    let mut toggles = EffectToggles::new();
    let mut viewport: Option<ViewportHandle> = None;
    let mut size = window.framebuffer_size();
    let mut frames = 0u64;
    let start = window.time();

    while !window.should_close() {
        for event in window.poll_events() {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) => window.set_should_close(true),
                WindowEvent::Key(key, _, Action::Press, _) => {
                    if let Some(index) = effect_index(key) {
                        toggles.toggle(index);
                    }
                }
                WindowEvent::FramebufferSize(width, height) => {
                    size = (width.max(0) as u32, height.max(0) as u32);
                    backend.resize(size.0, size.1);
                }
                _ => {}
            }
        }

        if !ensure_viewport(&mut backend, &mut viewport, size.0, size.1)? {
            // minimized
            window.wait_events();
            continue;
        }
        let Some(target) = viewport else { continue };

        let time = (window.time() - start) as f32;
        let view = demo.view(target, time, &toggles.effects());
        render_frame(&mut backend, &[view], target)?;
        frames += 1;
    }

    backend.flush()?;
    let seconds = window.time() - start;
    if seconds > 0.0 {
        log::info!("Rendered {frames} frames, {:.1} fps", frames as f64 / seconds);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = match ViewerConfig::load_or_default(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to read {CONFIG_PATH}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config) {
        log::error!("Viewer failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_toggles_run_fxaa_only() {
        assert_eq!(EffectToggles::new().effects(), vec![PostEffect::Fxaa]);
    }

    #[test]
    fn test_toggle_keeps_chain_order() {
        let mut toggles = EffectToggles::new();
        toggles.toggle(4);
        toggles.toggle(1);
        let effects = toggles.effects();
        assert_eq!(effects.len(), 3);
        assert_eq!(effects[0], PostEffect::Fxaa);
        assert_eq!(effects[1], PostEffect::Sharpen(0.3));
        assert!(matches!(effects[2], PostEffect::Outline(..)));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ViewerConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(config.model.is_none());
        assert!(config.renderer.validate().is_ok());
    }
}
