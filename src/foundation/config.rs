use crate::foundation::error::{IoResultExt, LapseError, LapseResult};
use crate::plan::fps::FpsPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_OUTPUT_FPS: u32 = 30;
pub const DEFAULT_CRF: u32 = 23;
pub const DEFAULT_TARGET_LENGTH: u32 = 10;
pub const DEFAULT_VARIABLE_FPS_MIN: u32 = 5;
pub const DEFAULT_VARIABLE_FPS_MAX: u32 = 60;

pub const DEFAULT_OUTPUT_DIR: &str = "/useremain/app/gk/Time-lapse-Video/";
pub const DEFAULT_TEMP_DIR_BASE: &str = "/tmp/timelapse_frames";
pub const DEFAULT_RECOVERY_DIR: &str = "/mnt/udisk/timelapse";

pub const DEFAULT_BUNDLED_TRANSCODER: &str = "/userdata/app/gk/ffmpeg";
pub const DEFAULT_SYSTEM_TRANSCODER: &str = "/ac_lib/lib/third_bin/ffmpeg";
pub const DEFAULT_SYSTEM_LIB_PATH: &str = "/ac_lib/lib/third_lib:/userdata/app/gk";

const FPS_RANGE: (u32, u32) = (1, 120);
const CRF_RANGE: (u32, u32) = (0, 51);
const TARGET_LENGTH_RANGE: (u32, u32) = (1, 300);
const VARIABLE_MIN_RANGE: (u32, u32) = (1, 60);
const VARIABLE_MAX_RANGE: (u32, u32) = (1, 120);
const DUPLICATE_RANGE: (u32, u32) = (0, 60);

const SHELL_SIGNIFICANT: &[char] = &[
    '\'', '"', '`', '$', ';', '&', '|', '<', '>', '*', '?', '(', ')', '{', '}', '[', ']', '!',
    '\\', '\n', '\r', '\0',
];

/// Mirror flags applied to the software transcoder as a video filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Flip {
    /// Transcoder filter expression, `None` when no flip is configured.
    pub fn filter(self) -> Option<&'static str> {
        match (self.horizontal, self.vertical) {
            (true, true) => Some("hflip,vflip"),
            (true, false) => Some("hflip"),
            (false, true) => Some("vflip"),
            (false, false) => None,
        }
    }
}

/// Locations of the external transcoder binaries used by the software cascade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub bundled: PathBuf,
    pub system: PathBuf,
    /// `LD_LIBRARY_PATH` prefix for the system transcoder.
    pub system_lib_path: String,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            bundled: PathBuf::from(DEFAULT_BUNDLED_TRANSCODER),
            system: PathBuf::from(DEFAULT_SYSTEM_TRANSCODER),
            system_lib_path: DEFAULT_SYSTEM_LIB_PATH.to_string(),
        }
    }
}

/// Time-lapse settings that persist across sessions.
///
/// The JSON key names match the printer's configuration store. Zero values fall back to the
/// documented defaults when a session starts (see [`SessionConfig::resolved`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(rename = "timelapse_output_fps")]
    pub output_fps: u32,
    #[serde(rename = "timelapse_crf")]
    pub crf: u32,
    #[serde(rename = "timelapse_variable_fps")]
    pub variable_fps: bool,
    #[serde(rename = "timelapse_target_length")]
    pub target_length: u32,
    #[serde(rename = "timelapse_variable_fps_min")]
    pub variable_fps_min: u32,
    #[serde(rename = "timelapse_variable_fps_max")]
    pub variable_fps_max: u32,
    #[serde(rename = "timelapse_duplicate_last_frame")]
    pub duplicate_last_frame: u32,
    #[serde(rename = "timelapse_flip_x")]
    pub flip_x: bool,
    #[serde(rename = "timelapse_flip_y")]
    pub flip_y: bool,
    #[serde(rename = "timelapse_output_dir", skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(rename = "timelapse_temp_dir", skip_serializing_if = "Option::is_none")]
    pub temp_dir_base: Option<PathBuf>,
    #[serde(rename = "timelapse_usb_path", skip_serializing_if = "Option::is_none")]
    pub recovery_dir: Option<PathBuf>,
    #[serde(rename = "timelapse_transcoder")]
    pub transcoder: TranscoderConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_fps: DEFAULT_OUTPUT_FPS,
            crf: DEFAULT_CRF,
            variable_fps: false,
            target_length: DEFAULT_TARGET_LENGTH,
            variable_fps_min: DEFAULT_VARIABLE_FPS_MIN,
            variable_fps_max: DEFAULT_VARIABLE_FPS_MAX,
            duplicate_last_frame: 0,
            flip_x: false,
            flip_y: false,
            output_dir: None,
            temp_dir_base: None,
            recovery_dir: None,
            transcoder: TranscoderConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load a config file, clamping every numeric field into its supported range.
    pub fn load(path: &Path) -> LapseResult<Self> {
        use anyhow::Context as _;
        let text = std::fs::read_to_string(path)
            .io_context(|| format!("read config '{}'", path.display()))?;
        let cfg: SessionConfig = serde_json::from_str(&text)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        Ok(cfg.clamped())
    }

    /// Like [`SessionConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> LapseResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> LapseResult<()> {
        use anyhow::Context as _;
        let text = serde_json::to_string_pretty(self).context("serialize config")?;
        std::fs::write(path, text).io_context(|| format!("write config '{}'", path.display()))
    }

    pub fn clamped(mut self) -> Self {
        let clamp = |v: u32, (lo, hi): (u32, u32)| v.clamp(lo, hi);
        self.output_fps = clamp(self.output_fps, FPS_RANGE);
        self.crf = clamp(self.crf, CRF_RANGE);
        self.target_length = clamp(self.target_length, TARGET_LENGTH_RANGE);
        self.variable_fps_min = clamp(self.variable_fps_min, VARIABLE_MIN_RANGE);
        self.variable_fps_max = clamp(self.variable_fps_max, VARIABLE_MAX_RANGE);
        self.duplicate_last_frame = clamp(self.duplicate_last_frame, DUPLICATE_RANGE);
        self
    }

    /// Snapshot taken at session start: zero/unset values replaced with defaults.
    pub fn resolved(&self) -> Self {
        let or = |v: u32, d: u32| if v == 0 { d } else { v };
        let mut out = self.clone();
        out.output_fps = or(self.output_fps, DEFAULT_OUTPUT_FPS);
        out.crf = or(self.crf, DEFAULT_CRF);
        out.target_length = or(self.target_length, DEFAULT_TARGET_LENGTH);
        out.variable_fps_min = or(self.variable_fps_min, DEFAULT_VARIABLE_FPS_MIN);
        out.variable_fps_max = or(self.variable_fps_max, DEFAULT_VARIABLE_FPS_MAX);
        if out.variable_fps_max < out.variable_fps_min {
            out.variable_fps_max = out.variable_fps_min;
        }
        out.output_dir = Some(self.output_dir());
        out.temp_dir_base = Some(self.temp_dir_base());
        out.recovery_dir = Some(self.recovery_dir());
        out
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    pub fn temp_dir_base(&self) -> PathBuf {
        self.temp_dir_base
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_DIR_BASE))
    }

    pub fn recovery_dir(&self) -> PathBuf {
        self.recovery_dir
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RECOVERY_DIR))
    }

    pub fn fps_policy(&self) -> FpsPolicy {
        FpsPolicy {
            fixed_fps: self.output_fps,
            variable: self.variable_fps,
            target_length_secs: self.target_length,
            min_fps: self.variable_fps_min,
            max_fps: self.variable_fps_max,
        }
    }

    pub fn flip(&self) -> Flip {
        Flip {
            horizontal: self.flip_x,
            vertical: self.flip_y,
        }
    }

    pub fn set_fps(&mut self, fps: u32) -> LapseResult<()> {
        check_range("output fps", fps, FPS_RANGE)?;
        self.output_fps = fps;
        tracing::info!(fps, "set output fps");
        Ok(())
    }

    pub fn set_crf(&mut self, crf: u32) -> LapseResult<()> {
        check_range("crf", crf, CRF_RANGE)?;
        self.crf = crf;
        tracing::info!(crf, "set crf");
        Ok(())
    }

    /// Enable variable fps. Zero arguments select the defaults, as the firmware does.
    pub fn set_variable_fps(
        &mut self,
        min_fps: u32,
        max_fps: u32,
        target_length: u32,
    ) -> LapseResult<()> {
        let min_fps = if min_fps == 0 { DEFAULT_VARIABLE_FPS_MIN } else { min_fps };
        let max_fps = if max_fps == 0 { DEFAULT_VARIABLE_FPS_MAX } else { max_fps };
        let target_length = if target_length == 0 {
            DEFAULT_TARGET_LENGTH
        } else {
            target_length
        };
        check_range("variable fps min", min_fps, VARIABLE_MIN_RANGE)?;
        check_range("variable fps max", max_fps, VARIABLE_MAX_RANGE)?;
        check_range("target length", target_length, TARGET_LENGTH_RANGE)?;
        if max_fps < min_fps {
            return Err(LapseError::config(format!(
                "variable fps max ({max_fps}) is below min ({min_fps})"
            )));
        }
        self.variable_fps = true;
        self.variable_fps_min = min_fps;
        self.variable_fps_max = max_fps;
        self.target_length = target_length;
        tracing::info!(min_fps, max_fps, target_length, "set variable fps");
        Ok(())
    }

    pub fn disable_variable_fps(&mut self) {
        self.variable_fps = false;
    }

    pub fn set_duplicate_last(&mut self, count: u32) -> LapseResult<()> {
        check_range("duplicate last frame", count, DUPLICATE_RANGE)?;
        self.duplicate_last_frame = count;
        Ok(())
    }

    pub fn set_flip(&mut self, flip_x: bool, flip_y: bool) {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
    }

    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) -> LapseResult<()> {
        let dir = dir.into();
        validate_dir(&dir)?;
        tracing::info!(dir = %dir.display(), "set output directory");
        self.output_dir = Some(dir);
        Ok(())
    }

    pub fn set_temp_dir(&mut self, dir: impl Into<PathBuf>) -> LapseResult<()> {
        let dir = dir.into();
        validate_dir(&dir)?;
        if dir.file_name().is_none() {
            return Err(LapseError::config(format!(
                "temp directory base '{}' has no final component",
                dir.display()
            )));
        }
        self.temp_dir_base = Some(dir);
        Ok(())
    }

    pub fn set_recovery_dir(&mut self, dir: impl Into<PathBuf>) -> LapseResult<()> {
        let dir = dir.into();
        validate_dir(&dir)?;
        self.recovery_dir = Some(dir);
        Ok(())
    }
}

fn check_range(what: &str, value: u32, (lo, hi): (u32, u32)) -> LapseResult<()> {
    if value < lo || value > hi {
        return Err(LapseError::config(format!(
            "{what} {value} outside supported range {lo}..={hi}"
        )));
    }
    Ok(())
}

/// Validate a single file-name component used to derive output names.
pub fn validate_base_name(name: &str) -> LapseResult<()> {
    if name.is_empty() {
        return Err(LapseError::config("base name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(LapseError::config(format!("base name '{name}' is reserved")));
    }
    if name.contains('/') {
        return Err(LapseError::config(format!(
            "base name '{name}' must not contain a path separator"
        )));
    }
    if let Some(c) = name.chars().find(|c| SHELL_SIGNIFICANT.contains(c)) {
        return Err(LapseError::config(format!(
            "base name '{name}' contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

/// Validate a directory path supplied by a collaborator.
pub fn validate_dir(dir: &Path) -> LapseResult<()> {
    let Some(text) = dir.to_str() else {
        return Err(LapseError::config(format!(
            "directory '{}' is not valid UTF-8",
            dir.display()
        )));
    };
    if text.is_empty() {
        return Err(LapseError::config("directory must not be empty"));
    }
    if let Some(c) = text.chars().find(|c| SHELL_SIGNIFICANT.contains(c)) {
        return Err(LapseError::config(format!(
            "directory '{text}' contains forbidden character {c:?}"
        )));
    }
    if dir.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(LapseError::config(format!(
            "directory '{text}' must not contain '..'"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
