use crate::capture::stager::count_staged_frames;
use crate::encode::orchestrator::{EncodeOrchestrator, FinalizeRequest};
use crate::foundation::config::SessionConfig;
use crate::foundation::error::{LapseError, LapseResult};
use crate::foundation::fsutil::remove_dir_quiet;
use crate::plan::naming::{frame_dir_pid, recovered_name, timestamp_now};
use crate::recovery::process::{is_alive, lower_priority};
use crate::session::status::{EncodeStatus, StatusCell};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

const THREAD_NAME: &str = "timelapse-recovery";

/// Frame directory left behind by a process that is no longer running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Orphan {
    pub dir: PathBuf,
    pub pid: u32,
}

/// Tally of one recovery pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    pub orphans: u32,
    /// Encoded into a video.
    pub recovered: u32,
    /// Encoding failed but the frames were copied to removable storage.
    pub preserved: u32,
    /// Directories without frames, deleted outright.
    pub removed_empty: u32,
    /// Left in place for a later pass.
    pub failed: u32,
}

impl RecoverySummary {
    pub fn status(&self) -> EncodeStatus {
        if self.failed > 0 || (self.preserved > 0 && self.recovered == 0) {
            EncodeStatus::Failed
        } else {
            EncodeStatus::Success
        }
    }

    pub fn detail(&self) -> String {
        format!(
            "recovery: {} recovered, {} preserved, {} failed, {} empty removed",
            self.recovered, self.preserved, self.failed, self.removed_empty
        )
    }
}

/// Finds frame directories of dead sibling processes and encodes or preserves them.
#[derive(Clone)]
pub struct RecoveryScanner {
    config: SessionConfig,
    orchestrator: EncodeOrchestrator,
    status: StatusCell,
    own_pid: u32,
    running: Arc<AtomicBool>,
}

struct ScanGuard(Arc<AtomicBool>);

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RecoveryScanner {
    pub fn new(
        config: &SessionConfig,
        orchestrator: EncodeOrchestrator,
        status: StatusCell,
    ) -> Self {
        let mut config = config.resolved();
        // A retried orphan must not grow by another batch of duplicates.
        config.duplicate_last_frame = 0;
        Self {
            config,
            orchestrator,
            status,
            own_pid: std::process::id(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Sibling frame directories whose owner is gone.
    pub fn orphans(&self) -> LapseResult<Vec<Orphan>> {
        let base = self.config.temp_dir_base();
        let parent = match base.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let entries = match std::fs::read_dir(&parent) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LapseError::io(format!("list '{}'", parent.display()), e)),
        };

        let mut out: Vec<Orphan> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| {
                let dir = e.path();
                let pid = frame_dir_pid(&base, &dir)?;
                self.is_orphan(pid).then_some(Orphan { dir, pid })
            })
            .collect();
        out.sort_by_key(|o| o.pid);
        Ok(out)
    }

    fn is_orphan(&self, pid: u32) -> bool {
        pid > 1 && pid != self.own_pid && !is_alive(pid)
    }

    /// Cheap synchronous check used to decide whether a scan is worth a thread.
    pub fn has_orphans(&self) -> bool {
        self.orphans().is_ok_and(|o| !o.is_empty())
    }

    /// Run a pass on a background thread at reduced priority.
    ///
    /// Returns `None` when there is nothing to do or a pass is already running.
    pub fn spawn(&self) -> Option<JoinHandle<RecoverySummary>> {
        if !self.has_orphans() {
            return None;
        }
        let guard = self.try_claim()?;
        let scanner = self.clone();
        self.status.set(EncodeStatus::Pending, "recovery scan queued");

        let spawned = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                lower_priority();
                scanner.run(guard)
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "failed to spawn recovery thread");
                self.status.set(EncodeStatus::Idle, "");
                None
            }
        }
    }

    /// Run a pass on the calling thread. `None` when another pass holds the scanner.
    pub fn scan_blocking(&self) -> Option<RecoverySummary> {
        let guard = self.try_claim()?;
        Some(self.run(guard))
    }

    fn try_claim(&self) -> Option<ScanGuard> {
        if self.running.swap(true, Ordering::AcqRel) {
            tracing::debug!("recovery scan already running");
            return None;
        }
        Some(ScanGuard(Arc::clone(&self.running)))
    }

    #[tracing::instrument(name = "recovery_scan", skip_all)]
    fn run(&self, _guard: ScanGuard) -> RecoverySummary {
        let orphans = match self.orphans() {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, "recovery listing failed");
                return RecoverySummary::default();
            }
        };

        let mut summary = RecoverySummary {
            orphans: orphans.len() as u32,
            ..RecoverySummary::default()
        };
        for orphan in &orphans {
            self.recover_one(orphan, &mut summary);
        }

        if summary.orphans > 0 {
            tracing::info!(
                recovered = summary.recovered,
                preserved = summary.preserved,
                failed = summary.failed,
                removed_empty = summary.removed_empty,
                "recovery pass finished"
            );
            self.status.set(summary.status(), summary.detail());
        }
        summary
    }

    fn recover_one(&self, orphan: &Orphan, summary: &mut RecoverySummary) {
        let frames = count_staged_frames(&orphan.dir);
        if frames == 0 {
            tracing::info!(dir = %orphan.dir.display(), "removing empty orphan");
            remove_dir_quiet(&orphan.dir);
            summary.removed_empty += 1;
            return;
        }

        tracing::info!(
            dir = %orphan.dir.display(),
            pid = orphan.pid,
            frames,
            "recovering orphan"
        );
        self.status.set(
            EncodeStatus::Running,
            format!("recovering {frames} frames from pid {}", orphan.pid),
        );

        let output_dir = self.config.output_dir();
        let report = self.orchestrator.finalize(&FinalizeRequest {
            frame_dir: &orphan.dir,
            frame_count: frames,
            geometry: None,
            output_dir: &output_dir,
            name: recovered_name(&output_dir, &timestamp_now()),
            config: &self.config,
            owner_pid: orphan.pid,
        });

        if report.succeeded() {
            summary.recovered += 1;
            remove_dir_quiet(&orphan.dir);
        } else if report.frames_safe() {
            summary.preserved += 1;
            remove_dir_quiet(&orphan.dir);
        } else {
            tracing::warn!(
                dir = %orphan.dir.display(),
                detail = %report.detail,
                "orphan kept for a later pass"
            );
            summary.failed += 1;
        }
    }
}

#[cfg(all(test, unix))]
#[path = "../../tests/unit/recovery/scanner.rs"]
mod tests;
