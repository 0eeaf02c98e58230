use crate::capture::source::FrameSource;
use crate::capture::stager::{CapturedFrame, FrameStager};
use crate::encode::orchestrator::{EncodeOrchestrator, EncodeReport, FinalizeRequest};
use crate::foundation::config::{SessionConfig, validate_base_name, validate_dir};
use crate::foundation::error::{LapseError, LapseResult};
use crate::foundation::fsutil::{ensure_dir, remove_dir_quiet};
use crate::plan::naming::{OutputName, frame_dir, next_sequence};
use crate::session::status::{EncodeStatus, StatusCell, StatusSnapshot};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const GCODE_SUFFIX: &str = ".gcode";

/// State of the one recording in progress.
struct ActiveSession {
    base_name: String,
    sequence: u32,
    output_dir: PathBuf,
    /// Resolved at start; later config edits do not reach a running session.
    config: SessionConfig,
    stager: FrameStager,
}

/// Point-in-time view for status endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub active: bool,
    pub custom_mode: bool,
    pub base_name: Option<String>,
    pub sequence: Option<u32>,
    pub frame_count: u32,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub hardware_active: bool,
    #[serde(flatten)]
    pub encode: StatusSnapshot,
}

/// Start/capture/finalize/cancel for this process's time-lapse.
pub struct SessionController {
    config: SessionConfig,
    source: Arc<dyn FrameSource>,
    orchestrator: EncodeOrchestrator,
    status: StatusCell,
    pid: u32,
    custom_mode: bool,
    session: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        source: Arc<dyn FrameSource>,
        orchestrator: EncodeOrchestrator,
    ) -> Self {
        Self {
            config: config.clamped(),
            source,
            orchestrator,
            status: StatusCell::new(),
            pid: std::process::id(),
            custom_mode: false,
            session: None,
        }
    }

    /// Share an existing status cell, e.g. with a [`crate::RecoveryScanner`].
    pub fn with_status_cell(mut self, status: StatusCell) -> Self {
        self.status = status;
        self
    }

    pub fn status_cell(&self) -> StatusCell {
        self.status.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Settings for the next session; an active session keeps its snapshot.
    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    pub fn orchestrator(&self) -> &EncodeOrchestrator {
        &self.orchestrator
    }

    /// Frame directory this process records into.
    pub fn frame_dir(&self) -> PathBuf {
        frame_dir(&self.config.temp_dir_base(), self.pid)
    }

    /// Begin a host-controlled recording named `base_name`.
    ///
    /// An active session is cancelled first. `output_dir`, when given, becomes the configured
    /// output directory. Sets custom mode so RPC-driven starts are ignored from now on.
    #[tracing::instrument(skip(self, output_dir))]
    pub fn start(&mut self, base_name: &str, output_dir: Option<&Path>) -> LapseResult<()> {
        validate_base_name(base_name)?;
        let mut candidate = self.config.clone();
        if let Some(dir) = output_dir {
            validate_dir(dir)?;
            candidate.set_output_dir(dir)?;
        }
        // Neither the directory nor custom mode sticks unless the session actually begins.
        self.begin(base_name, candidate.resolved())?;
        self.config = candidate;
        self.custom_mode = true;
        Ok(())
    }

    /// Begin a recording on behalf of the print job RPC, named after the gcode file.
    ///
    /// While custom mode is set this does nothing and reports success.
    #[tracing::instrument(skip(self))]
    pub fn start_from_rpc(&mut self, gcode_path: &str) -> LapseResult<()> {
        if self.custom_mode {
            tracing::info!("custom mode enabled, ignoring rpc start");
            return Ok(());
        }
        let name = gcode_base_name(gcode_path)
            .ok_or_else(|| LapseError::config(format!("no file name in '{gcode_path}'")))?;
        validate_base_name(name)?;
        let config = self.config.resolved();
        self.begin(name, config)
    }

    pub fn set_custom_mode(&mut self, enabled: bool) {
        self.custom_mode = enabled;
        tracing::info!(enabled, "custom mode");
    }

    pub fn custom_mode(&self) -> bool {
        self.custom_mode
    }

    fn begin(&mut self, base_name: &str, config: SessionConfig) -> LapseResult<()> {
        if self.session.is_some() {
            tracing::info!("cancelling existing session");
            self.cancel();
        }

        let output_dir = config.output_dir();
        let dir = frame_dir(&config.temp_dir_base(), self.pid);

        remove_dir_quiet(&dir);
        ensure_dir(&dir)?;
        if let Err(e) = ensure_dir(&output_dir) {
            remove_dir_quiet(&dir);
            return Err(e);
        }

        let sequence = next_sequence(base_name, &output_dir);
        tracing::info!(
            base_name,
            sequence,
            frames = %dir.display(),
            output = %output_dir.display(),
            fps = config.output_fps,
            crf = config.crf,
            variable_fps = config.variable_fps,
            "timelapse started"
        );

        self.session = Some(ActiveSession {
            base_name: base_name.to_string(),
            sequence,
            output_dir,
            stager: FrameStager::new(dir, Arc::clone(&self.source)),
            config,
        });
        Ok(())
    }

    /// Stage the frame source's latest picture.
    pub fn capture_frame(&mut self) -> LapseResult<CapturedFrame> {
        let session = self.session.as_mut().ok_or(LapseError::NotActive)?;
        session.stager.capture()
    }

    /// Encode the session, publish the outcome and return to idle.
    ///
    /// The frame directory is deleted on every outcome; after an encoder failure the frames have
    /// been copied to the recovery directory when storage was available.
    #[tracing::instrument(skip(self))]
    pub fn finalize(&mut self) -> LapseResult<EncodeReport> {
        let session = self.session.take().ok_or(LapseError::NotActive)?;
        let dir = session.stager.dir().to_path_buf();
        let frame_count = session.stager.frame_count();

        if frame_count == 0 {
            tracing::info!("no frames captured, cancelling");
            remove_dir_quiet(&dir);
            self.status.set(EncodeStatus::Failed, "no frames captured");
            return Ok(EncodeReport::failed("no frames captured", 0));
        }

        // Another process may have written the same name since start.
        let sequence = session
            .sequence
            .max(next_sequence(&session.base_name, &session.output_dir));
        if sequence != session.sequence {
            tracing::info!(
                planned = session.sequence,
                sequence,
                "output name taken, moving to next sequence"
            );
        }

        self.status.set(
            EncodeStatus::Running,
            format!("encoding {frame_count} frames"),
        );
        let report = self.orchestrator.finalize(&FinalizeRequest {
            frame_dir: &dir,
            frame_count,
            geometry: session.stager.geometry(),
            output_dir: &session.output_dir,
            name: OutputName::Session {
                base_name: session.base_name.clone(),
                sequence,
            },
            config: &session.config,
            owner_pid: self.pid,
        });

        // The directory name is reused by the next session of this process.
        remove_dir_quiet(&dir);
        self.status.set(report.status, report.detail.clone());
        Ok(report)
    }

    /// Drop the session and its frames.
    pub fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(
                frames = session.stager.frame_count(),
                "timelapse cancelled"
            );
            remove_dir_quiet(session.stager.dir());
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Frames staged so far, 0 when idle.
    pub fn frame_count(&self) -> u32 {
        self.session
            .as_ref()
            .map_or(0, |s| s.stager.frame_count())
    }

    pub fn encode_status(&self) -> EncodeStatus {
        self.status.status()
    }

    pub fn encode_detail(&self) -> String {
        self.status.detail()
    }

    pub fn hardware_active(&self) -> bool {
        self.orchestrator.hardware_active()
    }

    pub fn status(&self) -> SessionStatus {
        let session = self.session.as_ref();
        let geometry = session.and_then(|s| s.stager.geometry());
        SessionStatus {
            active: session.is_some(),
            custom_mode: self.custom_mode,
            base_name: session.map(|s| s.base_name.clone()),
            sequence: session.map(|s| s.sequence),
            frame_count: self.frame_count(),
            frame_width: geometry.map(|g| g.0),
            frame_height: geometry.map(|g| g.1),
            hardware_active: self.hardware_active(),
            encode: self.status.snapshot(),
        }
    }
}

/// `dir/benchy.gcode` → `benchy`; everything from the first `.gcode` on is dropped.
fn gcode_base_name(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next().unwrap_or(path);
    let name = match file.find(GCODE_SUFFIX) {
        Some(at) => &file[..at],
        None => file,
    };
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
#[path = "../../tests/unit/session/controller.rs"]
mod tests;
