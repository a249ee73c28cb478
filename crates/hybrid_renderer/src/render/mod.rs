//! Concrete rendering backends

pub mod backends;
