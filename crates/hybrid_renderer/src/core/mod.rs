//! Core renderer settings

pub mod config;

pub use config::{IblConfig, PresentModePreference, RendererConfig, ShadowConfig};
