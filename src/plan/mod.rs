//! Pure planning helpers: output naming and frame-rate selection.

pub mod fps;
pub mod naming;
