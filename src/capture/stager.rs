use crate::capture::jpeg::{MAX_JPEG_BYTES, read_info, validate_jpeg};
use crate::capture::source::FrameSource;
use crate::foundation::error::{LapseError, LapseResult};
use crate::foundation::fsutil::write_durable;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upper bound on staged frames per session: the index is four decimal digits.
pub const MAX_FRAMES: u32 = 10_000;

/// `printf`-style input pattern understood by the external transcoder.
pub const FRAME_PATTERN: &str = "frame_%04d.jpg";

pub fn frame_file_name(index: u32) -> String {
    format!("frame_{index:04}.jpg")
}

pub fn frame_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(frame_file_name(index))
}

/// Number of contiguous staged frames starting at index 0.
pub fn count_staged_frames(dir: &Path) -> u32 {
    (0..MAX_FRAMES)
        .take_while(|&i| frame_path(dir, i).is_file())
        .count() as u32
}

/// One accepted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapturedFrame {
    pub index: u32,
    pub bytes: usize,
    pub sequence: u64,
}

/// Pulls frames from a [`FrameSource`] and persists them into one session directory.
pub struct FrameStager {
    dir: PathBuf,
    source: Arc<dyn FrameSource>,
    buf: Vec<u8>,
    frame_count: u32,
    last_sequence: Option<u64>,
    geometry: Option<(u32, u32)>,
}

impl FrameStager {
    pub fn new(dir: impl Into<PathBuf>, source: Arc<dyn FrameSource>) -> Self {
        Self {
            dir: dir.into(),
            source,
            buf: vec![0u8; MAX_JPEG_BYTES],
            frame_count: 0,
            last_sequence: None,
            geometry: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Dimensions of the first accepted frame.
    pub fn geometry(&self) -> Option<(u32, u32)> {
        self.geometry
    }

    /// Stage the source's latest frame as `frame_<frame_count>.jpg`.
    ///
    /// The file is fully written and synced before this returns.
    pub fn capture(&mut self) -> LapseResult<CapturedFrame> {
        if self.frame_count >= MAX_FRAMES {
            return Err(LapseError::FrameLimit(MAX_FRAMES));
        }

        let (len, sequence) = self.source.copy_latest(&mut self.buf);
        if len == 0 {
            return Err(LapseError::NoData);
        }
        if self.last_sequence == Some(sequence) {
            return Err(LapseError::DuplicateFrame(sequence));
        }

        let jpeg = &self.buf[..len];
        validate_jpeg(jpeg)?;
        let info = read_info(jpeg)?;

        let index = self.frame_count;
        write_durable(&frame_path(&self.dir, index), jpeg)?;

        self.frame_count += 1;
        self.last_sequence = Some(sequence);
        if self.geometry.is_none() {
            self.geometry = Some((info.width, info.height));
        }
        tracing::debug!(index, bytes = len, sequence, "captured frame");

        Ok(CapturedFrame {
            index,
            bytes: len,
            sequence,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/stager.rs"]
mod tests;
