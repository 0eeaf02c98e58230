//! Turning a directory of staged frames into an MP4.
//!
//! Every way of producing a video is an [`EncodeStrategy`]; the orchestrator walks an ordered
//! list of them (hardware pipeline first, then the transcoder tiers) until one succeeds.

pub mod hw;
pub mod orchestrator;
pub mod software;

use crate::foundation::config::Flip;
use crate::foundation::error::{LapseError, LapseResult};
use std::path::Path;

/// Everything a strategy needs to encode one frame directory.
#[derive(Clone, Copy, Debug)]
pub struct EncodeJob<'a> {
    pub frame_dir: &'a Path,
    pub frame_count: u32,
    pub fps: u32,
    pub crf: u32,
    pub flip: Flip,
    /// Frame size if already known from capture.
    pub geometry: Option<(u32, u32)>,
    pub output: &'a Path,
}

/// Outcome of a successful strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub frames_encoded: u32,
    pub frame_errors: u32,
}

/// One way of producing `job.output` from `job.frame_dir`.
pub trait EncodeStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Encode the whole job or fail without leaving a partial output behind.
    fn try_encode(&self, job: &EncodeJob<'_>) -> LapseResult<EncodeStats>;
}

/// Try `strategies` in order and return the name and stats of the first that succeeds.
///
/// Every failure is logged; exhaustion carries the last failure's message.
pub fn run_strategies(
    strategies: &[&dyn EncodeStrategy],
    job: &EncodeJob<'_>,
) -> LapseResult<(String, EncodeStats)> {
    let mut last = String::from("no encoder available");
    for strategy in strategies {
        match strategy.try_encode(job) {
            Ok(stats) => {
                tracing::info!(
                    encoder = strategy.name(),
                    frames = stats.frames_encoded,
                    errors = stats.frame_errors,
                    "encode succeeded"
                );
                return Ok((strategy.name().to_string(), stats));
            }
            Err(e) => {
                tracing::warn!(
                    encoder = strategy.name(),
                    error = %e,
                    "encoder failed, trying next"
                );
                last = format!("{}: {e}", strategy.name());
            }
        }
    }
    Err(LapseError::EncodeCascadeExhausted(last))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/strategies.rs"]
mod tests;
