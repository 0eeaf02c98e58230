use crate::capture::stager::{MAX_FRAMES, frame_path};
use crate::encode::hw::HardwareEncodePipeline;
use crate::encode::software::SoftwareEncodeCascade;
use crate::encode::{EncodeJob, EncodeStrategy, run_strategies};
use crate::foundation::config::SessionConfig;
use crate::foundation::error::LapseResult;
use crate::foundation::fsutil::{copy_durable, ensure_dir};
use crate::plan::fps::effective_fps;
use crate::plan::naming::{OutputName, OutputPaths, timestamp_now};
use crate::recovery::preserve::preserve_frames;
use crate::session::status::EncodeStatus;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One frame directory to be turned into a video.
#[derive(Clone, Debug)]
pub struct FinalizeRequest<'a> {
    pub frame_dir: &'a Path,
    pub frame_count: u32,
    /// Frame size locked at capture, if known.
    pub geometry: Option<(u32, u32)>,
    pub output_dir: &'a Path,
    pub name: OutputName,
    /// Resolved settings snapshot.
    pub config: &'a SessionConfig,
    /// Pid embedded in the frame directory name; used for the preservation directory.
    pub owner_pid: u32,
}

/// Outcome of [`EncodeOrchestrator::finalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeReport {
    pub status: EncodeStatus,
    pub detail: String,
    /// Set on success.
    pub outputs: Option<OutputPaths>,
    pub encoder: Option<String>,
    /// Frames handed to the encoder, including duplicates of the last frame.
    pub frame_count: u32,
    pub frame_errors: u32,
    /// Where raw frames were copied after every encoder failed.
    pub preserved: Option<PathBuf>,
}

impl EncodeReport {
    pub(crate) fn failed(detail: impl Into<String>, frame_count: u32) -> Self {
        Self {
            status: EncodeStatus::Failed,
            detail: detail.into(),
            outputs: None,
            encoder: None,
            frame_count,
            frame_errors: 0,
            preserved: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == EncodeStatus::Success
    }

    /// Whether the frames exist somewhere other than the frame directory.
    pub fn frames_safe(&self) -> bool {
        self.succeeded() || self.preserved.is_some()
    }
}

/// Runs the encoder cascade over a frame directory: hardware first, then each transcoder tier.
#[derive(Clone)]
pub struct EncodeOrchestrator {
    hardware: Option<Arc<HardwareEncodePipeline>>,
    software: Arc<SoftwareEncodeCascade>,
}

impl EncodeOrchestrator {
    pub fn new(
        hardware: Option<Arc<HardwareEncodePipeline>>,
        software: Arc<SoftwareEncodeCascade>,
    ) -> Self {
        Self { hardware, software }
    }

    pub fn software_only(software: SoftwareEncodeCascade) -> Self {
        Self::new(None, Arc::new(software))
    }

    pub fn hardware(&self) -> Option<&HardwareEncodePipeline> {
        self.hardware.as_deref()
    }

    /// Whether a hardware session is open right now.
    pub fn hardware_active(&self) -> bool {
        self.hardware.as_ref().is_some_and(|hw| hw.is_active())
    }

    fn strategies(&self) -> Vec<&dyn EncodeStrategy> {
        let mut out: Vec<&dyn EncodeStrategy> = Vec::with_capacity(4);
        if let Some(hw) = &self.hardware {
            out.push(&**hw as &dyn EncodeStrategy);
        }
        out.extend(
            self.software
                .tiers()
                .iter()
                .map(|t| t as &dyn EncodeStrategy),
        );
        out
    }

    /// Encode `req.frame_dir` into the output directory and copy a thumbnail next to it.
    ///
    /// When every encoder fails the raw frames are copied to the recovery directory. The frame
    /// directory itself is never deleted here.
    #[tracing::instrument(
        skip_all,
        fields(dir = %req.frame_dir.display(), frames = req.frame_count, name = %req.name.stem())
    )]
    pub fn finalize(&self, req: &FinalizeRequest<'_>) -> EncodeReport {
        if req.frame_count == 0 {
            return EncodeReport::failed("no frames captured", 0);
        }

        let duplicates =
            duplicate_last_frame(req.frame_dir, req.frame_count, req.config.duplicate_last_frame);
        let total = req.frame_count + duplicates;
        let fps = effective_fps(total, &req.config.fps_policy());
        let paths = req.name.paths(req.output_dir, total);
        tracing::info!(frames = total, fps, video = %paths.video.display(), "encoding");

        let result = ensure_dir(req.output_dir).and_then(|()| {
            let job = EncodeJob {
                frame_dir: req.frame_dir,
                frame_count: total,
                fps,
                crf: req.config.crf,
                flip: req.config.flip(),
                geometry: req.geometry,
                output: &paths.video,
            };
            run_strategies(&self.strategies(), &job)
        });

        match result {
            Ok((encoder, stats)) => {
                let last = frame_path(req.frame_dir, total - 1);
                if let Err(e) = copy_durable(&last, &paths.thumbnail) {
                    tracing::warn!(error = %e, "thumbnail copy failed");
                }
                EncodeReport {
                    status: EncodeStatus::Success,
                    detail: format!(
                        "{} frames, {} errors ({encoder})",
                        stats.frames_encoded, stats.frame_errors
                    ),
                    outputs: Some(paths),
                    encoder: Some(encoder),
                    frame_count: total,
                    frame_errors: stats.frame_errors,
                    preserved: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "all encoders failed");
                let mut report = EncodeReport::failed(e.to_string(), total);
                match self.preserve(req, total) {
                    Ok(dest) => {
                        report.detail = format!("{e}; frames saved to {}", dest.display());
                        report.preserved = Some(dest);
                    }
                    Err(pe) => tracing::warn!(error = %pe, "frame preservation failed"),
                }
                report
            }
        }
    }

    fn preserve(&self, req: &FinalizeRequest<'_>, total: u32) -> LapseResult<PathBuf> {
        let prefix = match &req.name {
            OutputName::Session { base_name, .. } => base_name.as_str(),
            OutputName::Recovered { .. } => "recovered",
        };
        preserve_frames(
            req.frame_dir,
            total,
            &req.config.recovery_dir(),
            prefix,
            &timestamp_now(),
            req.owner_pid,
        )
    }
}

/// Copy the last staged frame up to `requested` times, bounded by [`MAX_FRAMES`].
///
/// Returns how many copies were written; a failed copy stops the loop.
fn duplicate_last_frame(dir: &Path, frame_count: u32, requested: u32) -> u32 {
    let room = MAX_FRAMES.saturating_sub(frame_count);
    let wanted = requested.min(room);
    if wanted < requested {
        tracing::warn!(requested, wanted, "duplicate count clamped to frame limit");
    }

    let last = frame_path(dir, frame_count - 1);
    let mut written = 0;
    for i in 0..wanted {
        if let Err(e) = copy_durable(&last, &frame_path(dir, frame_count + i)) {
            tracing::warn!(error = %e, written, "stopped duplicating last frame");
            break;
        }
        written += 1;
    }
    if written > 0 {
        tracing::debug!(written, "duplicated last frame");
    }
    written
}

#[cfg(test)]
#[path = "../../tests/unit/encode/orchestrator.rs"]
mod tests;
