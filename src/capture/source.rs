use std::sync::Mutex;

/// Supplier of the most recent camera JPEG.
///
/// Sequence numbers increase monotonically with every new frame the source publishes; copying
/// the same frame twice returns the same sequence number.
pub trait FrameSource: Send + Sync {
    /// Copy the latest frame into `buf`, returning `(bytes_written, sequence)`.
    ///
    /// Returns 0 bytes when no frame is available or the frame does not fit in `buf`.
    fn copy_latest(&self, buf: &mut [u8]) -> (usize, u64);
}

#[derive(Default)]
struct Latest {
    data: Vec<u8>,
    sequence: u64,
}

/// In-process latest-frame slot: a producer publishes, the stager copies.
#[derive(Default)]
pub struct SharedFrameBuffer {
    latest: Mutex<Latest>,
}

impl SharedFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest frame and return its sequence number.
    pub fn publish(&self, jpeg: &[u8]) -> u64 {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.data.clear();
        latest.data.extend_from_slice(jpeg);
        latest.sequence += 1;
        latest.sequence
    }

    pub fn sequence(&self) -> u64 {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sequence
    }
}

impl FrameSource for SharedFrameBuffer {
    fn copy_latest(&self, buf: &mut [u8]) -> (usize, u64) {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        let n = latest.data.len();
        if n == 0 || n > buf.len() {
            return (0, latest.sequence);
        }
        buf[..n].copy_from_slice(&latest.data);
        (n, latest.sequence)
    }
}
