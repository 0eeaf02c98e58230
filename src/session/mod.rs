//! The live time-lapse of this process and the status it publishes.

pub mod controller;
pub mod status;
