//! Hardware H.264 path: JPEG decode, NV12 repack, encoder channel, MP4 mux.
//!
//! The driver, JPEG codec and muxer are capability seams ([`EncoderDriver`], [`JpegDecoder`],
//! [`MuxerFactory`]); [`HardwareEncodePipeline`] owns the per-session resources and their
//! release order.

pub mod decoder;
pub mod driver;
pub mod mux;
pub mod pipeline;
pub mod yuv;

pub use decoder::{DecoderFactory, I420Frame, ImageJpegDecoder, JpegDecoder};
pub use driver::{
    AccessUnit, BlockHandle, ChannelConfig, EncoderChannel, EncoderDriver, FramePool,
    PoolConfig, RawFrame,
};
pub use mux::{Mp4Muxer, MuxerFactory, TrackConfig};
pub use pipeline::{HardwareBackend, HardwareEncodePipeline, HardwareSession};
