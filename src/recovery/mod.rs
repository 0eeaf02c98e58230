//! Work left behind by crashed processes: find it, encode it, or save the raw frames.

pub mod preserve;
pub mod process;
pub mod scanner;
