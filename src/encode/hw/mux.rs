use crate::foundation::error::LapseResult;
use std::fs::File;

/// MP4 track clock; 90 kHz matches common container timescales.
pub const TIMESCALE_90KHZ: u32 = 90_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackConfig {
    pub width: u32,
    pub height: u32,
    pub timescale: u32,
}

/// H.264-in-MP4 writer bound to one output file.
///
/// Dropping without [`Mp4Muxer::close`] abandons the container.
pub trait Mp4Muxer: Send {
    /// Append one access unit with its presentation time and duration in track ticks.
    fn write_access_unit(&mut self, data: &[u8], pts: u64, duration: u32) -> LapseResult<()>;

    /// Flush the bitstream writer and write the container index.
    fn close(self: Box<Self>) -> LapseResult<()>;
}

pub trait MuxerFactory: Send + Sync {
    /// Start a container in `file`; the muxer may seek and rewrite earlier bytes.
    fn open(&self, file: File, track: &TrackConfig) -> LapseResult<Box<dyn Mp4Muxer>>;
}
