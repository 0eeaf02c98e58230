//! Layerlapse captures one camera JPEG per printed layer and turns the sequence into an MP4.
//!
//! The crate is organised around a [`SessionController`]:
//!
//! - [`SessionController::start`] opens a per-process frame directory
//! - [`SessionController::capture_frame`] stages the latest frame from a [`FrameSource`]
//! - [`SessionController::finalize`] runs the [`EncodeOrchestrator`]: the hardware H.264
//!   pipeline when one is configured, then the [`SoftwareEncodeCascade`] transcoder tiers
//!
//! Frame directories left behind by crashed processes are picked up by the [`RecoveryScanner`].
#![deny(unsafe_code)]

pub mod capture;
pub mod encode;
mod foundation;
pub mod plan;
pub mod recovery;
pub mod session;

pub use crate::foundation::config::{self, Flip, SessionConfig, TranscoderConfig};
pub use crate::foundation::error::{IoResultExt, LapseError, LapseResult};

pub use crate::capture::jpeg;
pub use crate::capture::source::{FrameSource, SharedFrameBuffer};
pub use crate::capture::stager::{CapturedFrame, FrameStager, MAX_FRAMES};
pub use crate::encode::hw;
pub use crate::encode::hw::HardwareEncodePipeline;
pub use crate::encode::orchestrator::{EncodeOrchestrator, EncodeReport, FinalizeRequest};
pub use crate::encode::software::{SoftwareEncodeCascade, TranscoderTier, VideoCodec};
pub use crate::encode::{EncodeJob, EncodeStats, EncodeStrategy};
pub use crate::plan::{fps, naming};
pub use crate::recovery::scanner::{RecoveryScanner, RecoverySummary};
pub use crate::session::controller::{SessionController, SessionStatus};
pub use crate::session::status::{EncodeStatus, StatusCell, StatusSnapshot};

#[cfg(test)]
#[path = "../tests/unit/support.rs"]
pub(crate) mod test_support;
