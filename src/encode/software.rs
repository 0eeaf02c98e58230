use crate::capture::stager::FRAME_PATTERN;
use crate::encode::{EncodeJob, EncodeStats, EncodeStrategy, run_strategies};
use crate::foundation::config::TranscoderConfig;
use crate::foundation::error::{LapseError, LapseResult};
use crate::foundation::fsutil::ensure_parent_dir;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const X264_PARAMS: &str =
    "keyint=30:min-keyint=10:scenecut=0:bframes=0:ref=1:rc-lookahead=0:threads=1";

/// Codec settings passed to the external transcoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    /// libx264 tuned for minimal memory, quality from the job's CRF.
    X264,
    /// MPEG-4 part 2 at fixed quantizer 5; the low-memory last resort.
    Mpeg4,
}

/// One (binary, codec) combination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscoderTier {
    name: String,
    binary: PathBuf,
    lib_path: Option<String>,
    codec: VideoCodec,
}

impl TranscoderTier {
    pub fn new(
        name: impl Into<String>,
        binary: impl Into<PathBuf>,
        lib_path: Option<String>,
        codec: VideoCodec,
    ) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            lib_path,
            codec,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    /// Literal argument vector for `job`.
    pub fn args(&self, job: &EncodeJob<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-framerate".into(),
            job.fps.to_string().into(),
            "-i".into(),
            job.frame_dir.join(FRAME_PATTERN).into_os_string(),
        ];
        if let Some(filter) = job.flip.filter() {
            args.push("-vf".into());
            args.push(filter.into());
        }
        match self.codec {
            VideoCodec::X264 => {
                for a in [
                    "-c:v",
                    "libx264",
                    "-preset",
                    "ultrafast",
                    "-tune",
                    "zerolatency",
                    "-x264-params",
                    X264_PARAMS,
                    "-crf",
                ] {
                    args.push(a.into());
                }
                args.push(job.crf.to_string().into());
                args.push("-pix_fmt".into());
                args.push("yuv420p".into());
            }
            VideoCodec::Mpeg4 => {
                for a in ["-c:v", "mpeg4", "-q:v", "5"] {
                    args.push(a.into());
                }
            }
        }
        args.push(job.output.as_os_str().to_owned());
        args
    }

    fn run(&self, job: &EncodeJob<'_>) -> LapseResult<()> {
        if !self.binary.is_file() {
            return Err(LapseError::encoder(format!(
                "transcoder '{}' not found",
                self.binary.display()
            )));
        }
        ensure_parent_dir(job.output)?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(lib_path) = &self.lib_path {
            cmd.env("LD_LIBRARY_PATH", lib_path);
        }

        let status = cmd.status().map_err(|e| {
            LapseError::encoder(format!(
                "failed to spawn '{}': {e}",
                self.binary.display()
            ))
        })?;
        if !status.success() {
            return Err(LapseError::encoder(format!(
                "transcoder exited with {status}"
            )));
        }
        match std::fs::metadata(job.output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(LapseError::encoder("transcoder produced no output")),
        }
    }
}

impl EncodeStrategy for TranscoderTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_encode(&self, job: &EncodeJob<'_>) -> LapseResult<EncodeStats> {
        tracing::debug!(
            tier = %self.name,
            fps = job.fps,
            frames = job.frame_count,
            "running transcoder"
        );
        match self.run(job) {
            Ok(()) => Ok(EncodeStats {
                frames_encoded: job.frame_count,
                frame_errors: 0,
            }),
            Err(e) => {
                let _ = std::fs::remove_file(job.output);
                Err(e)
            }
        }
    }
}

/// Ordered transcoder tiers, tried until one exits cleanly.
#[derive(Clone, Debug)]
pub struct SoftwareEncodeCascade {
    tiers: Vec<TranscoderTier>,
}

impl SoftwareEncodeCascade {
    pub fn new(tiers: Vec<TranscoderTier>) -> Self {
        Self { tiers }
    }

    /// Bundled libx264, system libx264 with its library path, system mpeg4.
    pub fn from_config(cfg: &TranscoderConfig) -> Self {
        let lib_path = Some(cfg.system_lib_path.clone()).filter(|p| !p.is_empty());
        Self::new(vec![
            TranscoderTier::new("bundled-x264", &cfg.bundled, None, VideoCodec::X264),
            TranscoderTier::new("system-x264", &cfg.system, lib_path.clone(), VideoCodec::X264),
            TranscoderTier::new("system-mpeg4", &cfg.system, lib_path, VideoCodec::Mpeg4),
        ])
    }

    pub fn tiers(&self) -> &[TranscoderTier] {
        &self.tiers
    }

    /// Run the tiers on their own; returns the winning tier's name.
    #[tracing::instrument(level = "debug", skip_all, fields(output = %job.output.display()))]
    pub fn run(&self, job: &EncodeJob<'_>) -> LapseResult<(String, EncodeStats)> {
        let strategies: Vec<&dyn EncodeStrategy> = self
            .tiers
            .iter()
            .map(|t| t as &dyn EncodeStrategy)
            .collect();
        run_strategies(&strategies, job)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/software.rs"]
mod tests;
