//! Frame intake: the live frame source seam, JPEG structure checks and on-disk staging.

pub mod jpeg;
pub mod source;
pub mod stager;
