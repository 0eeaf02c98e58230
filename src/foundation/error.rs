/// Convenience result type used across layerlapse.
pub type LapseResult<T> = Result<T, LapseError>;

/// Top-level error taxonomy used by capture, encode and recovery APIs.
#[derive(thiserror::Error, Debug)]
pub enum LapseError {
    /// Bad name, path or setting; rejected before any I/O happens.
    #[error("config error: {0}")]
    Config(String),

    /// File read/write/rename failure.
    #[error("io error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The frame source had nothing to hand out.
    #[error("no frame data available")]
    NoData,

    /// Same source sequence number as the previously accepted frame.
    #[error("duplicate frame (sequence {0})")]
    DuplicateFrame(u64),

    /// Structural JPEG validation failed.
    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    /// The session already holds the maximum number of staged frames.
    #[error("frame limit reached ({0} frames)")]
    FrameLimit(u32),

    /// Decoded frame size disagrees with the locked session size.
    #[error("geometry mismatch: got {got_width}x{got_height}, expected {width}x{height}")]
    GeometryMismatch {
        got_width: u32,
        got_height: u32,
        width: u32,
        height: u32,
    },

    #[error("decode error: {0}")]
    Decode(String),

    /// Hardware encoder submit/retrieve failure.
    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("muxer error: {0}")]
    Muxer(String),

    /// Hardware channel or pool could not be acquired.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// Every encoding strategy failed.
    #[error("encode cascade exhausted: {0}")]
    EncodeCascadeExhausted(String),

    #[error("no active timelapse session")]
    NotActive,

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LapseError {
    /// Build a [`LapseError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`LapseError::CorruptFrame`] value.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptFrame(msg.into())
    }

    /// Build a [`LapseError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`LapseError::Encoder`] value.
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    /// Build a [`LapseError::Muxer`] value.
    pub fn muxer(msg: impl Into<String>) -> Self {
        Self::Muxer(msg.into())
    }

    /// Build a [`LapseError::ResourceExhaustion`] value.
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhaustion(msg.into())
    }

    /// Build a [`LapseError::Io`] value.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Errors that only spoil a single frame and must not abort an encode session.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::CorruptFrame(_)
                | Self::GeometryMismatch { .. }
                | Self::Decode(_)
                | Self::Encoder(_)
                | Self::Muxer(_)
        )
    }
}

/// Attach a human-readable context to `std::io` results.
pub trait IoResultExt<T> {
    fn io_context<C, F>(self, f: F) -> LapseResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn io_context<C, F>(self, f: F) -> LapseResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|source| LapseError::io(f(), source))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
