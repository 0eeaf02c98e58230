use crate::foundation::error::LapseResult;
use std::time::Duration;

/// Opaque id of a pooled hardware buffer, as understood by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum H264Profile {
    Baseline,
    Main,
    High,
}

/// Variable bitrate limits in kbit/s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VbrLimits {
    pub bitrate_kbps: u32,
    pub min_kbps: u32,
    pub max_kbps: u32,
}

/// Encoder channel setup for one time-lapse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub profile: H264Profile,
    pub rate: VbrLimits,
    /// Frames between IDRs.
    pub gop: u32,
    pub stream_buffers: u32,
}

impl ChannelConfig {
    /// High profile VBR around 4 Mbit/s with one IDR per second of output.
    pub fn timelapse(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            profile: H264Profile::High,
            rate: VbrLimits {
                bitrate_kbps: 4000,
                min_kbps: 1000,
                max_kbps: 8000,
            },
            gop: fps,
            stream_buffers: 2,
        }
    }

    /// Bytes in one NV12 picture of this geometry.
    pub fn nv12_len(&self) -> usize {
        nv12_len(self.width, self.height)
    }
}

pub fn nv12_len(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * 3 / 2
}

/// DMA buffer pool sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub block_len: usize,
    pub block_count: u32,
}

/// One NV12 picture queued to the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub block: BlockHandle,
    pub width: u32,
    pub height: u32,
}

/// One compressed frame's worth of bitstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessUnit {
    pub data: Vec<u8>,
    pub keyframe: bool,
}

/// A pool holding one acquired block that the CPU fills and the encoder reads.
///
/// Dropping the pool releases the block and destroys the pool.
pub trait FramePool: Send {
    fn handle(&self) -> BlockHandle;

    fn block_mut(&mut self) -> &mut [u8];

    /// Make CPU writes to the block visible to the hardware.
    fn flush(&mut self) -> LapseResult<()>;
}

/// An open encoder channel. Dropping it stops reception and destroys the channel.
pub trait EncoderChannel: Send {
    fn submit(&mut self, frame: RawFrame, timeout: Duration) -> LapseResult<()>;

    /// Collect the access units produced for the last submitted frame.
    fn retrieve(&mut self, timeout: Duration) -> LapseResult<Vec<AccessUnit>>;
}

/// Entry point to the hardware encoder.
///
/// Acquisition failures should be reported as [`crate::LapseError::ResourceExhaustion`].
pub trait EncoderDriver: Send + Sync {
    fn create_pool(&self, cfg: &PoolConfig) -> LapseResult<Box<dyn FramePool>>;

    fn open_channel(&self, cfg: &ChannelConfig) -> LapseResult<Box<dyn EncoderChannel>>;
}
