use crate::capture::jpeg::{MAX_JPEG_BYTES, validate_jpeg};
use crate::capture::stager::frame_path;
use crate::encode::hw::decoder::{DecoderFactory, I420Frame, JpegDecoder};
use crate::encode::hw::driver::{
    ChannelConfig, EncoderChannel, EncoderDriver, FramePool, PoolConfig, RawFrame, nv12_len,
};
use crate::encode::hw::mux::{Mp4Muxer, MuxerFactory, TIMESCALE_90KHZ, TrackConfig};
use crate::encode::hw::yuv::i420_to_nv12;
use crate::encode::{EncodeJob, EncodeStats, EncodeStrategy};
use crate::foundation::config::Flip;
use crate::foundation::error::{IoResultExt, LapseError, LapseResult};
use crate::foundation::fsutil::{ensure_parent_dir, move_file};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Container file written next to the frames until the session finishes.
pub const TEMP_FILE_NAME: &str = "timelapse.mp4.tmp";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(1);
const RETRIEVE_TIMEOUT: Duration = Duration::from_secs(1);
const POOL_BLOCKS: u32 = 2;

/// The three capabilities the hardware path is built from.
#[derive(Clone)]
pub struct HardwareBackend {
    pub driver: Arc<dyn EncoderDriver>,
    pub muxer: Arc<dyn MuxerFactory>,
    pub decoder: Arc<dyn DecoderFactory>,
}

/// Hardware encoder entry point. At most one [`HardwareSession`] is open at a time.
pub struct HardwareEncodePipeline {
    backend: HardwareBackend,
    active: Arc<AtomicBool>,
}

impl HardwareEncodePipeline {
    pub fn new(backend: HardwareBackend) -> Self {
        Self {
            backend,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a session currently holds the hardware.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Acquire decoder, buffer pool, encoder channel, temp file and muxer, in that order.
    ///
    /// On failure everything acquired so far is released in reverse order.
    #[tracing::instrument(level = "debug", skip(self), fields(dir = %temp_dir.display()))]
    pub fn open(
        &self,
        temp_dir: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> LapseResult<HardwareSession> {
        if width == 0 || height == 0 {
            return Err(LapseError::config(
                "hardware encode width/height must be non-zero",
            ));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(LapseError::config(format!(
                "hardware encode needs even dimensions, got {width}x{height}"
            )));
        }
        if fps == 0 {
            return Err(LapseError::config("hardware encode fps must be non-zero"));
        }
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(LapseError::exhausted("hardware pipeline busy"));
        }
        let active = ActiveGuard(Arc::clone(&self.active));

        let decoder = self.backend.decoder.create()?;
        let block_len = nv12_len(width, height);
        let pool = self.backend.driver.create_pool(&PoolConfig {
            block_len,
            block_count: POOL_BLOCKS,
        })?;
        let channel = self
            .backend
            .driver
            .open_channel(&ChannelConfig::timelapse(width, height, fps))?;
        let temp = TempOutput::create(temp_dir.join(TEMP_FILE_NAME))?;
        let file = temp
            .file()?
            .try_clone()
            .io_context(|| format!("clone handle of '{}'", temp.path.display()))?;
        let muxer = self.backend.muxer.open(
            file,
            &TrackConfig {
                width,
                height,
                timescale: TIMESCALE_90KHZ,
            },
        )?;

        tracing::debug!(width, height, fps, "hardware session open");
        Ok(HardwareSession {
            muxer: Some(muxer),
            temp,
            channel,
            pool,
            decoder,
            _active: active,
            width,
            height,
            frame_duration: TIMESCALE_90KHZ / fps,
            flip: Flip::default(),
            picture: I420Frame::new(width, height),
            pts: 0,
            frames_encoded: 0,
            frame_errors: 0,
            finished: false,
        })
    }
}

impl EncodeStrategy for HardwareEncodePipeline {
    fn name(&self) -> &str {
        "hardware"
    }

    fn try_encode(&self, job: &EncodeJob<'_>) -> LapseResult<EncodeStats> {
        let (width, height) = match job.geometry {
            Some(g) => g,
            None => {
                let first = frame_path(job.frame_dir, 0);
                let bytes = fs::read(&first)
                    .io_context(|| format!("read '{}'", first.display()))?;
                let info = crate::capture::jpeg::read_info(&bytes)?;
                (info.width, info.height)
            }
        };

        let mut session = self
            .open(job.frame_dir, width, height, job.fps)?
            .with_flip(job.flip);
        for index in 0..job.frame_count {
            // Per-frame failures are tallied inside the session.
            if let Err(e) = session.encode_file(&frame_path(job.frame_dir, index))
                && !e.is_per_frame()
            {
                return Err(e);
            }
        }
        session.finish(job.output)
    }
}

struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Temporary container file, removed on drop unless persisted.
struct TempOutput {
    path: PathBuf,
    file: Option<File>,
    persisted: bool,
}

impl TempOutput {
    fn create(path: PathBuf) -> LapseResult<Self> {
        let file = File::create(&path).io_context(|| format!("create '{}'", path.display()))?;
        Ok(Self {
            path,
            file: Some(file),
            persisted: false,
        })
    }

    fn file(&self) -> LapseResult<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| LapseError::muxer("temporary output already closed"))
    }

    /// Sync and close the handle, then move the file to `dst`.
    fn persist(&mut self, dst: &Path) -> LapseResult<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()
                .io_context(|| format!("sync '{}'", self.path.display()))?;
        }
        ensure_parent_dir(dst)?;
        move_file(&self.path, dst)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempOutput {
    fn drop(&mut self) {
        drop(self.file.take());
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// One open hardware encode.
///
/// Fields drop top to bottom, so resources are released in the reverse of acquisition order.
/// Dropping a session that was never finished discards its output.
pub struct HardwareSession {
    muxer: Option<Box<dyn Mp4Muxer>>,
    temp: TempOutput,
    channel: Box<dyn EncoderChannel>,
    pool: Box<dyn FramePool>,
    decoder: Box<dyn JpegDecoder>,
    _active: ActiveGuard,
    width: u32,
    height: u32,
    frame_duration: u32,
    flip: Flip,
    picture: I420Frame,
    pts: u64,
    frames_encoded: u32,
    frame_errors: u32,
    finished: bool,
}

impl HardwareSession {
    pub fn with_flip(mut self, flip: Flip) -> Self {
        self.flip = flip;
        self
    }

    pub fn frames_encoded(&self) -> u32 {
        self.frames_encoded
    }

    pub fn frame_errors(&self) -> u32 {
        self.frame_errors
    }

    /// Encode one JPEG.
    ///
    /// A [per-frame](LapseError::is_per_frame) failure spoils only this frame and is counted.
    /// Anything else means the session cannot continue and is returned uncounted.
    pub fn encode_frame(&mut self, jpeg: &[u8]) -> LapseResult<()> {
        match self.encode_inner(jpeg) {
            Ok(()) => {
                self.frames_encoded += 1;
                Ok(())
            }
            Err(e) if e.is_per_frame() => {
                self.frame_errors += 1;
                tracing::warn!(
                    frames_encoded = self.frames_encoded,
                    error = %e,
                    "hardware frame skipped"
                );
                Err(e)
            }
            Err(e) => {
                tracing::error!(
                    frames_encoded = self.frames_encoded,
                    error = %e,
                    "hardware session failed"
                );
                Err(e)
            }
        }
    }

    pub fn encode_file(&mut self, path: &Path) -> LapseResult<()> {
        match fs::read(path).io_context(|| format!("read '{}'", path.display())) {
            Ok(bytes) => self.encode_frame(&bytes),
            Err(e) => {
                self.frame_errors += 1;
                tracing::warn!(error = %e, "hardware frame unreadable");
                Err(e)
            }
        }
    }

    fn encode_inner(&mut self, jpeg: &[u8]) -> LapseResult<()> {
        if jpeg.len() > MAX_JPEG_BYTES {
            return Err(LapseError::corrupt(format!(
                "frame of {} bytes exceeds {MAX_JPEG_BYTES}",
                jpeg.len()
            )));
        }
        validate_jpeg(jpeg)?;

        let info = self.decoder.read_header(jpeg)?;
        if (info.width, info.height) != (self.width, self.height) {
            return Err(LapseError::GeometryMismatch {
                got_width: info.width,
                got_height: info.height,
                width: self.width,
                height: self.height,
            });
        }
        if !info.subsampling.is_supported() {
            return Err(LapseError::decode(format!(
                "unsupported chroma subsampling {:?}",
                info.subsampling
            )));
        }

        self.decoder.decode_i420(jpeg, &mut self.picture)?;
        self.picture.apply_flip(self.flip);
        i420_to_nv12(&self.picture, self.pool.block_mut())?;
        self.pool.flush()?;

        self.channel.submit(
            RawFrame {
                block: self.pool.handle(),
                width: self.width,
                height: self.height,
            },
            SUBMIT_TIMEOUT,
        )?;
        let units = self.channel.retrieve(RETRIEVE_TIMEOUT)?;

        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| LapseError::muxer("muxer already closed"))?;
        for unit in &units {
            muxer.write_access_unit(&unit.data, self.pts, self.frame_duration)?;
        }
        self.pts += u64::from(self.frame_duration);
        Ok(())
    }

    /// Close the container and move it to `output`.
    ///
    /// Channel, pool and decoder are released when `self` drops, whatever the outcome.
    #[tracing::instrument(level = "debug", skip_all, fields(output = %output.display()))]
    pub fn finish(mut self, output: &Path) -> LapseResult<EncodeStats> {
        if self.frames_encoded == 0 {
            return Err(LapseError::encoder(format!(
                "no frames encoded ({} errors)",
                self.frame_errors
            )));
        }
        let muxer = self
            .muxer
            .take()
            .ok_or_else(|| LapseError::muxer("muxer already closed"))?;
        muxer.close()?;
        self.temp.persist(output)?;
        self.finished = true;

        tracing::info!(
            frames = self.frames_encoded,
            errors = self.frame_errors,
            "hardware encode finished"
        );
        Ok(EncodeStats {
            frames_encoded: self.frames_encoded,
            frame_errors: self.frame_errors,
        })
    }

    /// Release everything and discard the temporary output.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for HardwareSession {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                frames = self.frames_encoded,
                "hardware session released without output"
            );
        }
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/encode/pipeline.rs"]
mod tests;
