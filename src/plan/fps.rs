/// Inputs for [`effective_fps`], taken from a session's resolved config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FpsPolicy {
    pub fixed_fps: u32,
    pub variable: bool,
    pub target_length_secs: u32,
    pub min_fps: u32,
    pub max_fps: u32,
}

/// Output frame rate for a time-lapse of `frame_count` frames.
///
/// With variable fps enabled the rate is chosen so the video lasts about
/// `target_length_secs`, clamped to `[min_fps, max_fps]`. Never returns 0.
pub fn effective_fps(frame_count: u32, policy: &FpsPolicy) -> u32 {
    let fixed = policy.fixed_fps.max(1);
    if !policy.variable || frame_count == 0 {
        return fixed;
    }

    let target = frame_count / policy.target_length_secs.max(1);
    let lo = policy.min_fps.max(1);
    let hi = policy.max_fps.max(lo);
    let fps = target.clamp(lo, hi);

    tracing::debug!(
        frame_count,
        target_secs = policy.target_length_secs,
        target,
        fps,
        "variable fps"
    );
    fps
}

#[cfg(test)]
#[path = "../../tests/unit/plan/fps.rs"]
mod tests;
