//! Foundation types shared by every layer of the renderer

pub mod math;
